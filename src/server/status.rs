use serde::Serialize;
use tracing::{debug, warn};

use super::{PING_COMMAND, RpcChannel, ServerRequest, ServerResponse, ServerState, StateProbe};
use crate::process::{PidStore, ProcessId};

/// Snapshot reported by `status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerStatus {
    pub state: ServerState,
    pub pid: Option<ProcessId>,
    /// Whether the server answered a ping
    pub responsive: bool,
}

impl ServerStatus {
    /// Blocks for up to the channel's timeout when the server is running.
    /// Only a running server is pinged; `flags` go out with the ping.
    pub fn collect(
        probe: &dyn StateProbe,
        pids: &dyn PidStore,
        channel: &dyn RpcChannel,
        flags: Vec<String>,
    ) -> Self {
        let state = probe.query();
        let pid = pids.read();

        let responsive = state == ServerState::Running
            && match channel.send(&ServerRequest::new(PING_COMMAND, flags)) {
                Ok(ServerResponse::Pong) => true,
                Ok(other) => {
                    warn!("Unexpected response to ping: {:?}", other);
                    false
                }
                Err(e) => {
                    debug!("Ping failed: {}", e);
                    false
                }
            };

        Self {
            state,
            pid,
            responsive,
        }
    }
}
