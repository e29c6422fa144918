//! Stopping the server and its watchers.
//!
//! The procedure never fails. A server that is running is first asked to stop
//! over its socket; if that request cannot be delivered, or the recorded
//! process is still around afterwards, the process is killed. A server that is
//! already dead still gets a forced termination so stale state is cleared.
//! Whatever happens, both watchers are stopped before returning.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{ClientConfig, ConfigError, log_directory_flags};
use crate::process::{
    FilePidStore, ForceReport, ForceTerminate, Liveness, LivenessSignal, PidKill, PidStore,
    ProcessId, ProcessSignals,
};
use crate::server::{
    RpcChannel, STOP_COMMAND, ServerRequest, ServerState, SocketChannel, SocketStateProbe,
    StateProbe,
};
use crate::subscriber::{
    PidFileSubscribers, Subscriber, SubscriberError, SubscriberLifecycle, SubscriberStop,
};

/// Flags sent with the stop request.
///
/// Only the log directory. Debug and verbosity settings of the invocation are
/// never forwarded.
pub fn stop_flags(log_directory: &Path) -> Vec<String> {
    log_directory_flags(log_directory)
}

/// Which step actually brought the server down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopTier {
    Graceful,
    Forceful,
    None,
}

/// Why forced termination was used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Escalation {
    /// The server was not running to begin with
    ServerDead,
    /// The stop request could not be delivered or was not acknowledged
    ChannelFailure,
    /// The recorded process survived the stop request
    StillAlive,
    /// No pid was recorded, so the exit could not be verified
    MissingPid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SubscriberOutcome {
    Signalled { pid: ProcessId },
    NotRunning,
    Failed { error: String },
}

impl From<Result<SubscriberStop, SubscriberError>> for SubscriberOutcome {
    fn from(result: Result<SubscriberStop, SubscriberError>) -> Self {
        match result {
            Ok(SubscriberStop::Signalled { pid }) => SubscriberOutcome::Signalled { pid },
            Ok(SubscriberStop::NotRunning) => SubscriberOutcome::NotRunning,
            Err(e) => SubscriberOutcome::Failed {
                error: e.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriberReport {
    pub name: String,
    #[serde(flatten)]
    pub outcome: SubscriberOutcome,
}

/// Net effect of one stop invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StopOutcome {
    pub state: ServerState,
    pub tier: StopTier,
    pub escalation: Option<Escalation>,
    pub force: Option<ForceReport>,
    pub force_error: Option<String>,
    pub subscribers: Vec<SubscriberReport>,
}

impl StopOutcome {
    /// True when neither watcher reported a failure
    pub fn subscribers_stopped(&self) -> bool {
        self.subscribers
            .iter()
            .all(|report| !matches!(report.outcome, SubscriberOutcome::Failed { .. }))
    }
}

/// Net effect of a kill invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KillOutcome {
    pub force: Option<ForceReport>,
    pub force_error: Option<String>,
    pub subscribers: Vec<SubscriberReport>,
}

struct ServerStop {
    tier: StopTier,
    escalation: Option<Escalation>,
    force: Option<ForceReport>,
    force_error: Option<String>,
}

/// Composes the capabilities that make up the stop procedure
pub struct StopOrchestrator {
    state: Arc<dyn StateProbe>,
    channel: Arc<dyn RpcChannel>,
    pids: Arc<dyn PidStore>,
    liveness: Arc<dyn LivenessSignal>,
    force: Arc<dyn ForceTerminate>,
    subscribers: Arc<dyn SubscriberLifecycle>,
    log_directory: PathBuf,
}

impl StopOrchestrator {
    pub fn new(
        state: Arc<dyn StateProbe>,
        channel: Arc<dyn RpcChannel>,
        pids: Arc<dyn PidStore>,
        liveness: Arc<dyn LivenessSignal>,
        force: Arc<dyn ForceTerminate>,
        subscribers: Arc<dyn SubscriberLifecycle>,
        log_directory: PathBuf,
    ) -> Self {
        Self {
            state,
            channel,
            pids,
            liveness,
            force,
            subscribers,
            log_directory,
        }
    }

    /// Wire the orchestrator to the real socket, pid file and process signals
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        let name = config.socket_name()?;
        let signals = Arc::new(ProcessSignals::new());
        let pids = Arc::new(FilePidStore::new(config.pid_path()));
        let force = PidKill::new(pids.clone(), signals.clone())
            .with_artifacts(vec![config.socket_path()]);

        Ok(Self::new(
            Arc::new(SocketStateProbe::new(name.clone())),
            Arc::new(SocketChannel::new(name, config.rpc_timeout)),
            pids,
            signals.clone(),
            Arc::new(force),
            Arc::new(PidFileSubscribers::new(signals)),
            config.log_directory.clone(),
        ))
    }

    pub fn flags(&self) -> Vec<String> {
        stop_flags(&self.log_directory)
    }

    pub fn run(&self) -> StopOutcome {
        // Armed before anything else so the watchers are released even if the
        // server branch unwinds
        let cleanup = WatcherCleanup::new(
            self.subscribers.as_ref(),
            Subscriber::watchers(&self.log_directory),
        );

        let state = self.state.query();
        info!("Stopping server (state: {})", state);
        let server = self.stop_server(state);

        let subscribers = cleanup.finish();

        StopOutcome {
            state,
            tier: server.tier,
            escalation: server.escalation,
            force: server.force,
            force_error: server.force_error,
            subscribers,
        }
    }

    /// Forced termination and watcher cleanup, without asking the server first
    pub fn kill(&self) -> KillOutcome {
        let cleanup = WatcherCleanup::new(
            self.subscribers.as_ref(),
            Subscriber::watchers(&self.log_directory),
        );

        let (force, force_error) = match self.force.run() {
            Ok(report) => (Some(report), None),
            Err(e) => {
                warn!("Forced termination failed: {}", e);
                (None, Some(e.to_string()))
            }
        };

        KillOutcome {
            force,
            force_error,
            subscribers: cleanup.finish(),
        }
    }

    fn stop_server(&self, state: ServerState) -> ServerStop {
        if state == ServerState::Dead {
            return self.escalate(Escalation::ServerDead, false);
        }

        let request = ServerRequest::new(STOP_COMMAND, self.flags());
        if let Err(e) = self.channel.send(&request) {
            warn!("Graceful stop failed, killing server: {}", e);
            return self.escalate(Escalation::ChannelFailure, false);
        }

        let Some(pid) = self.pids.read() else {
            debug!("Stop acknowledged but no pid recorded to verify against");
            return self.escalate(Escalation::MissingPid, true);
        };

        match self.liveness.probe(pid) {
            Liveness::NotFound => {
                info!("Server process {} exited", pid);
                ServerStop {
                    tier: StopTier::Graceful,
                    escalation: None,
                    force: None,
                    force_error: None,
                }
            }
            Liveness::Alive => {
                warn!("Server process {} still alive after stop request", pid);
                self.escalate(Escalation::StillAlive, true)
            }
        }
    }

    /// `acknowledged` is whether the server accepted the stop request, which
    /// makes it the likely cause of exit when nothing was left to kill.
    fn escalate(&self, escalation: Escalation, acknowledged: bool) -> ServerStop {
        match self.force.run() {
            Ok(report) => {
                let tier = match report {
                    ForceReport::Killed { .. } => StopTier::Forceful,
                    _ if acknowledged => StopTier::Graceful,
                    _ => StopTier::None,
                };
                ServerStop {
                    tier,
                    escalation: Some(escalation),
                    force: Some(report),
                    force_error: None,
                }
            }
            Err(e) => {
                // Not retried; the watchers still get cleaned up
                warn!("Forced termination failed: {}", e);
                ServerStop {
                    tier: StopTier::None,
                    escalation: Some(escalation),
                    force: None,
                    force_error: Some(e.to_string()),
                }
            }
        }
    }
}

/// Stops every watcher exactly once, either through `finish` or on drop.
struct WatcherCleanup<'a> {
    lifecycle: &'a dyn SubscriberLifecycle,
    pending: Option<[Subscriber; 2]>,
}

impl<'a> WatcherCleanup<'a> {
    fn new(lifecycle: &'a dyn SubscriberLifecycle, watchers: [Subscriber; 2]) -> Self {
        Self {
            lifecycle,
            pending: Some(watchers),
        }
    }

    fn finish(mut self) -> Vec<SubscriberReport> {
        match self.pending.take() {
            Some(watchers) => stop_watchers(self.lifecycle, &watchers),
            None => Vec::new(),
        }
    }
}

impl Drop for WatcherCleanup<'_> {
    fn drop(&mut self) {
        if let Some(watchers) = self.pending.take() {
            warn!("Stop interrupted, releasing watchers");
            stop_watchers(self.lifecycle, &watchers);
        }
    }
}

fn stop_watchers(
    lifecycle: &dyn SubscriberLifecycle,
    watchers: &[Subscriber],
) -> Vec<SubscriberReport> {
    watchers
        .iter()
        .map(|subscriber| {
            let result = lifecycle.stop(subscriber);
            if let Err(e) = &result {
                warn!("Failed to stop {}: {}", subscriber.name, e);
            }
            SubscriberReport {
                name: subscriber.name.clone(),
                outcome: result.into(),
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "stop_test.rs"]
mod stop_test;
