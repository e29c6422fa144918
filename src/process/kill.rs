use serde::Serialize;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{Delivery, PidStore, ProcessId, SignalError, SignalKind, SignalSender};

/// What the forced termination found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ForceReport {
    /// A kill signal was delivered to the recorded process
    Killed { pid: ProcessId },
    /// A pid was recorded but the process had already exited
    AlreadyGone { pid: ProcessId },
    /// Nothing was recorded, so there was nothing to signal
    NoPid,
}

#[derive(Debug, Error)]
pub enum KillError {
    #[error(transparent)]
    Signal(#[from] SignalError),
}

/// Forceful termination of the server
pub trait ForceTerminate: Send + Sync {
    /// A missing pid is not an error: the server may never have started
    fn run(&self) -> Result<ForceReport, KillError>;
}

/// Kills the process recorded in the pid store and clears the stale
/// artifacts it leaves behind.
pub struct PidKill {
    pids: Arc<dyn PidStore>,
    signals: Arc<dyn SignalSender>,
    artifacts: Vec<PathBuf>,
}

impl PidKill {
    pub fn new(pids: Arc<dyn PidStore>, signals: Arc<dyn SignalSender>) -> Self {
        Self {
            pids,
            signals,
            artifacts: Vec::new(),
        }
    }

    /// Files besides the pid record to remove once the process is known to be gone
    pub fn with_artifacts(mut self, artifacts: Vec<PathBuf>) -> Self {
        self.artifacts = artifacts;
        self
    }

    fn remove_artifacts(&self) {
        if let Err(e) = self.pids.clear() {
            warn!("Failed to clear recorded pid: {}", e);
        }
        for path in &self.artifacts {
            match fs::remove_file(path) {
                Ok(()) => debug!("Removed stale {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove stale {}: {}", path.display(), e),
            }
        }
    }
}

impl ForceTerminate for PidKill {
    fn run(&self) -> Result<ForceReport, KillError> {
        let Some(pid) = self.pids.read() else {
            debug!("No server pid recorded, nothing to kill");
            return Ok(ForceReport::NoPid);
        };

        let report = match self.signals.send(pid, SignalKind::Kill)? {
            Delivery::Delivered => {
                info!("Killed server process {}", pid);
                ForceReport::Killed { pid }
            }
            Delivery::AlreadyGone => {
                debug!("Server process {} already exited", pid);
                ForceReport::AlreadyGone { pid }
            }
        };

        self.remove_artifacts();
        Ok(report)
    }
}
