use anyhow::{Context, Result};
use serde_json::json;

use analysisd::config::ClientConfig;
use analysisd::process::FilePidStore;
use analysisd::server::{ServerStatus, SocketChannel, SocketStateProbe};

pub async fn handle_status(config: ClientConfig) -> Result<()> {
    let name = config.socket_name()?;
    let probe = SocketStateProbe::new(name.clone());
    let channel = SocketChannel::new(name, config.rpc_timeout);
    let pids = FilePidStore::new(config.pid_path());
    // Ping goes out with the general flags, debug included
    let flags = config.flags();

    let status =
        tokio::task::spawn_blocking(move || ServerStatus::collect(&probe, &pids, &channel, flags))
            .await
            .context("Status check did not run to completion")?;

    let output = json!({
        "state": status.state,
        "pid": status.pid,
        "responsive": status.responsive,
        "log_directory": config.log_directory,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
