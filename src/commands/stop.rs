use anyhow::{Context, Result};
use tracing::warn;

use analysisd::config::ClientConfig;
use analysisd::stop::StopOrchestrator;

/// Stop the server and its watchers. Never fails once the client is configured.
pub async fn handle_stop(config: ClientConfig) -> Result<()> {
    let orchestrator = StopOrchestrator::from_config(&config)?;

    let outcome = tokio::task::spawn_blocking(move || orchestrator.run())
        .await
        .context("Stop procedure did not run to completion")?;

    if !outcome.subscribers_stopped() {
        warn!("Not every watcher could be stopped, see the report");
    }

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
