#![allow(clippy::uninlined_format_args)]

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use analysisd::config::{ClientConfig, DEFAULT_LOG_DIRECTORY};
use analysisd::errors::AnalysisdError;

mod commands;

// Exit codes
const EXIT_SUCCESS: i32 = 0;

#[derive(Parser)]
#[command(name = "analysisd")]
#[command(about = "Control the background analysis server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding the server socket, pid file and watcher state
    #[arg(
        long,
        global = true,
        env = "ANALYSISD_LOG_DIR",
        default_value = DEFAULT_LOG_DIRECTORY
    )]
    log_directory: PathBuf,

    /// Verbose logging; forwarded to the server by commands other than stop
    #[arg(long, global = true)]
    debug: bool,

    /// Seconds to wait for the server to answer a request
    #[arg(long, global = true, default_value_t = 5)]
    rpc_timeout: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Stop the server and both watchers
    Stop,

    /// Kill the recorded server process and stop both watchers, without asking first
    Kill,

    /// Report whether the server is running and responsive
    Status,
}

#[tokio::main]
async fn main() {
    let result = run().await;

    // Handle exit codes based on error type
    match result {
        Ok(()) => std::process::exit(EXIT_SUCCESS),
        Err(err) => {
            let analysisd_err: AnalysisdError = err.into();

            // Output JSON error to stdout for programmatic consumption
            let error_json = json!({
                "error": true,
                "message": analysisd_err.to_string(),
                "exit_code": analysisd_err.exit_code()
            });
            println!(
                "{}",
                serde_json::to_string(&error_json).unwrap_or_else(|_| "{}".to_string())
            );

            // Also log to stderr for human reading
            eprintln!("Error: {}", analysisd_err);
            std::process::exit(analysisd_err.exit_code());
        }
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.debug {
        "analysisd=debug"
    } else {
        "analysisd=info"
    };

    // Initialize tracing to stderr (so JSON output to stdout remains clean)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();

    let config = ClientConfig::new(
        cli.log_directory,
        cli.debug,
        Duration::from_secs(cli.rpc_timeout),
    )?;

    match cli.command {
        Commands::Stop => commands::stop::handle_stop(config).await?,
        Commands::Kill => commands::kill::handle_kill(config).await?,
        Commands::Status => commands::status::handle_status(config).await?,
    }

    Ok(())
}
