#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::process::{KillError, SignalError};
    use crate::server::{ChannelError, ServerResponse};
    use crate::subscriber::{CONFIGURATION_MONITOR, FILE_MONITOR};
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedState(Mutex<VecDeque<ServerState>>);

    impl ScriptedState {
        fn new(states: &[ServerState]) -> Arc<Self> {
            Arc::new(Self(Mutex::new(states.iter().copied().collect())))
        }
    }

    impl StateProbe for ScriptedState {
        fn query(&self) -> ServerState {
            let mut states = self.0.lock().unwrap();
            // The last scripted state sticks
            if states.len() > 1 {
                states.pop_front().unwrap()
            } else {
                states[0]
            }
        }
    }

    #[derive(Clone, Copy)]
    enum ChannelBehavior {
        Acknowledge,
        Fail,
        Panic,
    }

    struct RecordingChannel {
        behavior: ChannelBehavior,
        requests: Mutex<Vec<ServerRequest>>,
    }

    impl RpcChannel for RecordingChannel {
        fn send(&self, request: &ServerRequest) -> Result<ServerResponse, ChannelError> {
            self.requests.lock().unwrap().push(request.clone());
            match self.behavior {
                ChannelBehavior::Acknowledge => {
                    Ok(ServerResponse::Success("shutting down".to_string()))
                }
                ChannelBehavior::Fail => Err(ChannelError::Closed),
                ChannelBehavior::Panic => panic!("channel blew up"),
            }
        }
    }

    struct FixedPid(Option<ProcessId>);

    impl PidStore for FixedPid {
        fn read(&self) -> Option<ProcessId> {
            self.0
        }

        fn clear(&self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct RecordingLiveness {
        answer: Liveness,
        probes: Mutex<Vec<ProcessId>>,
    }

    impl LivenessSignal for RecordingLiveness {
        fn probe(&self, pid: ProcessId) -> Liveness {
            self.probes.lock().unwrap().push(pid);
            self.answer
        }
    }

    struct CountingForce {
        fails: bool,
        report: ForceReport,
        calls: AtomicUsize,
    }

    impl ForceTerminate for CountingForce {
        fn run(&self) -> Result<ForceReport, KillError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fails {
                let pid = ProcessId::new(42).unwrap();
                return Err(KillError::Signal(SignalError::PermissionDenied(pid)));
            }
            Ok(self.report)
        }
    }

    struct RecordingSubscribers {
        failing: Option<&'static str>,
        stopped: Mutex<Vec<String>>,
    }

    impl SubscriberLifecycle for RecordingSubscribers {
        fn stop(&self, subscriber: &Subscriber) -> Result<SubscriberStop, SubscriberError> {
            self.stopped.lock().unwrap().push(subscriber.name.clone());
            if self.failing == Some(subscriber.name.as_str()) {
                let pid = ProcessId::new(7).unwrap();
                return Err(SubscriberError::Signal(SignalError::PermissionDenied(pid)));
            }
            Ok(SubscriberStop::NotRunning)
        }
    }

    struct Harness {
        state: Arc<ScriptedState>,
        channel: Arc<RecordingChannel>,
        pid: Option<ProcessId>,
        liveness: Arc<RecordingLiveness>,
        force: Arc<CountingForce>,
        subscribers: Arc<RecordingSubscribers>,
    }

    impl Harness {
        fn new(state: ServerState) -> Self {
            Self {
                state: ScriptedState::new(&[state]),
                channel: Arc::new(RecordingChannel {
                    behavior: ChannelBehavior::Acknowledge,
                    requests: Mutex::new(Vec::new()),
                }),
                pid: ProcessId::new(42),
                liveness: Arc::new(RecordingLiveness {
                    answer: Liveness::NotFound,
                    probes: Mutex::new(Vec::new()),
                }),
                force: Arc::new(CountingForce {
                    fails: false,
                    report: ForceReport::NoPid,
                    calls: AtomicUsize::new(0),
                }),
                subscribers: Arc::new(RecordingSubscribers {
                    failing: None,
                    stopped: Mutex::new(Vec::new()),
                }),
            }
        }

        fn states(mut self, states: &[ServerState]) -> Self {
            self.state = ScriptedState::new(states);
            self
        }

        fn channel(mut self, behavior: ChannelBehavior) -> Self {
            self.channel = Arc::new(RecordingChannel {
                behavior,
                requests: Mutex::new(Vec::new()),
            });
            self
        }

        fn pid(mut self, pid: Option<u32>) -> Self {
            self.pid = pid.and_then(ProcessId::new);
            self
        }

        fn liveness(mut self, answer: Liveness) -> Self {
            self.liveness = Arc::new(RecordingLiveness {
                answer,
                probes: Mutex::new(Vec::new()),
            });
            self
        }

        fn force(mut self, report: ForceReport, fails: bool) -> Self {
            self.force = Arc::new(CountingForce {
                fails,
                report,
                calls: AtomicUsize::new(0),
            });
            self
        }

        fn failing_subscriber(mut self, name: &'static str) -> Self {
            self.subscribers = Arc::new(RecordingSubscribers {
                failing: Some(name),
                stopped: Mutex::new(Vec::new()),
            });
            self
        }

        fn orchestrator(&self) -> StopOrchestrator {
            StopOrchestrator::new(
                self.state.clone(),
                self.channel.clone(),
                Arc::new(FixedPid(self.pid)),
                self.liveness.clone(),
                self.force.clone(),
                self.subscribers.clone(),
                PathBuf::from(".analysisd"),
            )
        }

        fn requests(&self) -> Vec<ServerRequest> {
            self.channel.requests.lock().unwrap().clone()
        }

        fn probes(&self) -> usize {
            self.liveness.probes.lock().unwrap().len()
        }

        fn force_calls(&self) -> usize {
            self.force.calls.load(Ordering::SeqCst)
        }

        fn stopped(&self) -> Vec<String> {
            self.subscribers.stopped.lock().unwrap().clone()
        }
    }

    fn both_watchers() -> Vec<String> {
        vec![FILE_MONITOR.to_string(), CONFIGURATION_MONITOR.to_string()]
    }

    #[test]
    fn test_running_server_that_survives_stop_is_killed() {
        let pid = ProcessId::new(42).unwrap();
        let harness = Harness::new(ServerState::Running)
            .liveness(Liveness::Alive)
            .force(ForceReport::Killed { pid }, false);

        let outcome = harness.orchestrator().run();

        assert_eq!(harness.requests().len(), 1);
        assert_eq!(*harness.liveness.probes.lock().unwrap(), vec![pid]);
        assert_eq!(harness.force_calls(), 1);
        assert_eq!(harness.stopped(), both_watchers());
        assert_eq!(outcome.tier, StopTier::Forceful);
        assert_eq!(outcome.escalation, Some(Escalation::StillAlive));
    }

    #[test]
    fn test_dead_server_is_force_terminated_without_request() {
        let harness = Harness::new(ServerState::Dead);

        let outcome = harness.orchestrator().run();

        assert!(harness.requests().is_empty());
        assert_eq!(harness.probes(), 0);
        assert_eq!(harness.force_calls(), 1);
        assert_eq!(harness.stopped(), both_watchers());
        assert_eq!(outcome.state, ServerState::Dead);
        assert_eq!(outcome.tier, StopTier::None);
        assert_eq!(outcome.escalation, Some(Escalation::ServerDead));
    }

    #[test]
    fn test_channel_failure_escalates_without_probe() {
        let harness = Harness::new(ServerState::Running).channel(ChannelBehavior::Fail);

        let outcome = harness.orchestrator().run();

        assert_eq!(harness.requests().len(), 1);
        assert_eq!(harness.probes(), 0);
        assert_eq!(harness.force_calls(), 1);
        assert_eq!(harness.stopped(), both_watchers());
        assert_eq!(outcome.escalation, Some(Escalation::ChannelFailure));
        assert!(outcome.force_error.is_none());
    }

    #[test]
    fn test_missing_pid_forces_as_safety_net() {
        let harness = Harness::new(ServerState::Running).pid(None);

        let outcome = harness.orchestrator().run();

        assert_eq!(harness.requests().len(), 1);
        assert_eq!(harness.probes(), 0);
        assert_eq!(harness.force_calls(), 1);
        assert_eq!(harness.stopped(), both_watchers());
        assert_eq!(outcome.escalation, Some(Escalation::MissingPid));
        // Acknowledged and nothing left to kill
        assert_eq!(outcome.tier, StopTier::Graceful);
    }

    #[test]
    fn test_confirmed_exit_skips_forced_termination() {
        let harness = Harness::new(ServerState::Running).liveness(Liveness::NotFound);

        let outcome = harness.orchestrator().run();

        assert_eq!(harness.probes(), 1);
        assert_eq!(harness.force_calls(), 0);
        assert_eq!(harness.stopped(), both_watchers());
        assert_eq!(outcome.tier, StopTier::Graceful);
        assert_eq!(outcome.escalation, None);
        assert_eq!(outcome.force, None);
    }

    #[test]
    fn test_stop_request_ignores_debug_flag() {
        let harness = Harness::new(ServerState::Running);
        let config = ClientConfig {
            debug: true,
            ..ClientConfig::default()
        };
        assert!(config.flags().contains(&"-debug".to_string()));

        harness.orchestrator().run();

        let requests = harness.requests();
        assert_eq!(requests[0].command, "stop");
        assert_eq!(requests[0].flags, vec!["-log-directory", ".analysisd"]);
        assert_eq!(
            stop_flags(&config.log_directory),
            vec!["-log-directory", ".analysisd"]
        );
    }

    #[test]
    fn test_second_stop_observes_dead_and_still_cleans_up() {
        let harness = Harness::new(ServerState::Running)
            .states(&[ServerState::Running, ServerState::Dead])
            .liveness(Liveness::Alive)
            .force(
                ForceReport::Killed {
                    pid: ProcessId::new(42).unwrap(),
                },
                false,
            );
        let orchestrator = harness.orchestrator();

        let first = orchestrator.run();
        let second = orchestrator.run();

        assert_eq!(first.state, ServerState::Running);
        assert_eq!(second.state, ServerState::Dead);
        assert_eq!(harness.requests().len(), 1);
        assert_eq!(harness.force_calls(), 2);
        assert_eq!(harness.stopped().len(), 4);
    }

    #[test]
    fn test_failing_watcher_does_not_block_the_other() {
        let harness = Harness::new(ServerState::Dead).failing_subscriber(FILE_MONITOR);

        let outcome = harness.orchestrator().run();

        assert_eq!(harness.stopped(), both_watchers());
        assert!(!outcome.subscribers_stopped());
        assert!(matches!(
            outcome.subscribers[0].outcome,
            SubscriberOutcome::Failed { .. }
        ));
        assert_eq!(
            outcome.subscribers[1].outcome,
            SubscriberOutcome::NotRunning
        );
    }

    #[test]
    fn test_force_failure_is_recorded_and_cleanup_runs() {
        let harness = Harness::new(ServerState::Running)
            .channel(ChannelBehavior::Fail)
            .force(ForceReport::NoPid, true);

        let outcome = harness.orchestrator().run();

        assert_eq!(harness.force_calls(), 1);
        assert_eq!(harness.stopped(), both_watchers());
        assert_eq!(outcome.tier, StopTier::None);
        assert!(
            outcome
                .force_error
                .as_deref()
                .is_some_and(|e| e.contains("permission denied"))
        );
    }

    #[test]
    fn test_watchers_released_when_server_branch_panics() {
        let harness = Harness::new(ServerState::Running).channel(ChannelBehavior::Panic);
        let orchestrator = harness.orchestrator();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| orchestrator.run()));

        assert!(result.is_err());
        assert_eq!(harness.stopped(), both_watchers());
    }

    #[test]
    fn test_outcome_serializes_for_cli() {
        let harness = Harness::new(ServerState::Dead);
        let outcome = harness.orchestrator().run();

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["state"], "DEAD");
        assert_eq!(json["escalation"], "server_dead");
        assert_eq!(json["force"]["result"], "no_pid");
        assert_eq!(json["subscribers"][0]["name"], "file_monitor");
        assert_eq!(json["subscribers"][0]["result"], "not_running");
    }

    #[test]
    fn test_kill_skips_request_and_cleans_up() {
        let pid = ProcessId::new(42).unwrap();
        let harness =
            Harness::new(ServerState::Running).force(ForceReport::Killed { pid }, false);

        let outcome = harness.orchestrator().kill();

        assert!(harness.requests().is_empty());
        assert_eq!(harness.force_calls(), 1);
        assert_eq!(harness.stopped(), both_watchers());
        assert_eq!(outcome.force, Some(ForceReport::Killed { pid }));
    }
}
