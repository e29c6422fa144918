//! Process identity and process-control capabilities used when stopping the
//! server and its watchers.

use serde::Serialize;
use std::fmt;

mod kill;
mod pid_store;
mod signals;
mod start_time;

pub use kill::{ForceReport, ForceTerminate, KillError, PidKill};
pub use pid_store::{FilePidStore, PidStore};
pub use signals::{
    Delivery, Liveness, LivenessSignal, ProcessSignals, SignalError, SignalKind, SignalSender,
};

/// A positive process id that can be signalled individually.
///
/// Zero and values above `i32::MAX` are rejected: on Unix they would address a
/// process group or every process the caller may signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ProcessId(u32);

impl ProcessId {
    pub fn new(raw: u32) -> Option<Self> {
        (raw > 0 && raw <= i32::MAX as u32).then_some(Self(raw))
    }

    /// Parse the plain decimal text of a pid file
    pub fn parse(content: &str) -> Option<Self> {
        content.trim().parse::<u32>().ok().and_then(Self::new)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
