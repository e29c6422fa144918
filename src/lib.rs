//! # analysisd
#![allow(clippy::uninlined_format_args)]
//!
//! Client-side control of the background analysis server.
//!
//! The server runs as a long-lived process next to two watchers, one for
//! file changes and one for configuration changes. All three keep their
//! state under a log directory (`.analysisd` by default):
//!
//! ```text
//! .analysisd/
//!   server/server.sock                      local socket, JSON lines
//!   server/server.pid                       server process id
//!   file_monitor/file_monitor.pid
//!   configuration_monitor/configuration_monitor.pid
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! # Stop the server and both watchers, whatever state they are in
//! analysisd stop
//!
//! # Skip the graceful request and kill everything recorded
//! analysisd kill
//!
//! # Is the server up, and does it answer?
//! analysisd status
//!
//! # Point at another project's state
//! analysisd --log-directory /path/to/project/.analysisd stop
//! ```
//!
//! Every command prints a single JSON object on stdout; logs go to stderr.
//!
//! ## Library Usage
//!
//! ```no_run
//! use analysisd::{ClientConfig, StopOrchestrator};
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = ClientConfig::default();
//! let outcome = StopOrchestrator::from_config(&config)?.run();
//! println!("stopped via {:?}", outcome.tier);
//! # Ok(())
//! # }
//! ```
//!
//! Each capability the stop procedure relies on (`StateProbe`, `RpcChannel`,
//! `PidStore`, `LivenessSignal`, `ForceTerminate`, `SubscriberLifecycle`) is a
//! trait, so the procedure can be driven without a real server process.

/// Client configuration and well-known paths
pub mod config;

/// Error types with process exit codes
pub mod errors;

/// Process ids, signals and forced termination
pub mod process;

/// Server state and request channel
pub mod server;

/// The stop procedure
pub mod stop;

/// File and configuration watchers
pub mod subscriber;

pub use config::ClientConfig;
pub use errors::AnalysisdError;
pub use process::{
    FilePidStore, ForceReport, ForceTerminate, Liveness, LivenessSignal, PidKill, PidStore,
    ProcessId, ProcessSignals,
};
pub use server::{
    RpcChannel, ServerRequest, ServerResponse, ServerState, ServerStatus, SocketChannel,
    SocketStateProbe, StateProbe,
};
pub use stop::{Escalation, KillOutcome, StopOrchestrator, StopOutcome, StopTier, stop_flags};
pub use subscriber::{PidFileSubscribers, Subscriber, SubscriberLifecycle};
