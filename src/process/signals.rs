use thiserror::Error;
use tracing::debug;

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

use super::ProcessId;

/// Result of a non-destructive existence probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// The process exists, or the probe could not tell
    Alive,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// Ask the process to wind down (SIGINT)
    Interrupt,
    /// Terminate without giving the process a say (SIGKILL)
    Kill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// The process no longer existed
    AlreadyGone,
}

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("permission denied signalling process {0}")]
    PermissionDenied(ProcessId),
    #[error("failed to signal process {pid}: {message}")]
    Failed { pid: ProcessId, message: String },
    #[error("process signalling is not supported on this platform")]
    Unsupported,
}

/// Checks whether a process id still refers to a process
pub trait LivenessSignal: Send + Sync {
    fn probe(&self, pid: ProcessId) -> Liveness;
}

/// Delivers signals to a process id
pub trait SignalSender: Send + Sync {
    fn send(&self, pid: ProcessId, kind: SignalKind) -> Result<Delivery, SignalError>;
}

/// Operating-system process signals
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessSignals;

impl ProcessSignals {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(unix)]
impl LivenessSignal for ProcessSignals {
    fn probe(&self, pid: ProcessId) -> Liveness {
        // Signal None is the null signal: nothing is delivered, only existence
        // and permission are checked
        match signal::kill(Pid::from_raw(pid.as_u32() as i32), None) {
            Ok(()) => Liveness::Alive,
            Err(Errno::ESRCH) => Liveness::NotFound,
            Err(e) => {
                debug!("Liveness probe for {} inconclusive ({}), assuming alive", pid, e);
                Liveness::Alive
            }
        }
    }
}

#[cfg(unix)]
impl SignalSender for ProcessSignals {
    fn send(&self, pid: ProcessId, kind: SignalKind) -> Result<Delivery, SignalError> {
        let sig = match kind {
            SignalKind::Interrupt => Signal::SIGINT,
            SignalKind::Kill => Signal::SIGKILL,
        };

        match signal::kill(Pid::from_raw(pid.as_u32() as i32), sig) {
            Ok(()) => {
                debug!("Sent {:?} to process {}", sig, pid);
                Ok(Delivery::Delivered)
            }
            Err(Errno::ESRCH) => Ok(Delivery::AlreadyGone),
            Err(Errno::EPERM) => Err(SignalError::PermissionDenied(pid)),
            Err(e) => Err(SignalError::Failed {
                pid,
                message: e.to_string(),
            }),
        }
    }
}

#[cfg(not(unix))]
impl LivenessSignal for ProcessSignals {
    fn probe(&self, pid: ProcessId) -> Liveness {
        debug!("Liveness probe unsupported, assuming {} is alive", pid);
        Liveness::Alive
    }
}

#[cfg(not(unix))]
impl SignalSender for ProcessSignals {
    fn send(&self, _pid: ProcessId, _kind: SignalKind) -> Result<Delivery, SignalError> {
        Err(SignalError::Unsupported)
    }
}
