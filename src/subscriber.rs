//! Background watch processes that live alongside the server

use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::process::{Delivery, ProcessId, SignalError, SignalKind, SignalSender};

pub const FILE_MONITOR: &str = "file_monitor";
pub const CONFIGURATION_MONITOR: &str = "configuration_monitor";

/// A named watcher and the directory holding its state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscriber {
    pub name: String,
    pub directory: PathBuf,
}

impl Subscriber {
    pub fn new(name: impl Into<String>, directory: PathBuf) -> Self {
        Self {
            name: name.into(),
            directory,
        }
    }

    /// The file watcher and the configuration watcher, in stop order
    pub fn watchers(log_directory: &Path) -> [Subscriber; 2] {
        [FILE_MONITOR, CONFIGURATION_MONITOR]
            .map(|name| Subscriber::new(name, log_directory.join(name)))
    }

    pub fn pid_path(&self) -> PathBuf {
        self.directory.join(format!("{}.pid", self.name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SubscriberStop {
    Signalled { pid: ProcessId },
    /// No live watcher was recorded
    NotRunning,
}

#[derive(Debug, Error)]
pub enum SubscriberError {
    #[error(transparent)]
    Signal(#[from] SignalError),
    #[error("failed to clear {path}: {source}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Stops watcher processes
pub trait SubscriberLifecycle: Send + Sync {
    fn stop(&self, subscriber: &Subscriber) -> Result<SubscriberStop, SubscriberError>;
}

/// Watchers that record their pid in `<directory>/<name>.pid`
pub struct PidFileSubscribers {
    signals: Arc<dyn SignalSender>,
}

impl PidFileSubscribers {
    pub fn new(signals: Arc<dyn SignalSender>) -> Self {
        Self { signals }
    }
}

impl SubscriberLifecycle for PidFileSubscribers {
    fn stop(&self, subscriber: &Subscriber) -> Result<SubscriberStop, SubscriberError> {
        let path = subscriber.pid_path();
        let Some(pid) = fs::read_to_string(&path)
            .ok()
            .and_then(|content| ProcessId::parse(&content))
        else {
            debug!("No {} pid recorded at {}", subscriber.name, path.display());
            return Ok(SubscriberStop::NotRunning);
        };

        let stop = match self.signals.send(pid, SignalKind::Interrupt)? {
            Delivery::Delivered => {
                info!("Stopped {} (pid {})", subscriber.name, pid);
                SubscriberStop::Signalled { pid }
            }
            Delivery::AlreadyGone => SubscriberStop::NotRunning,
        };

        match fs::remove_file(&path) {
            Ok(()) => Ok(stop),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(stop),
            Err(source) => Err(SubscriberError::Cleanup { path, source }),
        }
    }
}

#[cfg(test)]
#[path = "subscriber_test.rs"]
mod subscriber_test;
