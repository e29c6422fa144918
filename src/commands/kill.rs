use anyhow::{Context, Result};

use analysisd::config::ClientConfig;
use analysisd::stop::StopOrchestrator;

pub async fn handle_kill(config: ClientConfig) -> Result<()> {
    let orchestrator = StopOrchestrator::from_config(&config)?;

    let outcome = tokio::task::spawn_blocking(move || orchestrator.kill())
        .await
        .context("Kill did not run to completion")?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
