//! Single-task dispatcher between the outside world and the supervisor.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use flock_core::{ControlMessage, MasterState, REAP_TIMEOUT, Supervisor, SupervisorError};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::signals::Stimulus;
use crate::process::WorkerNotice;

/// Owns the supervisor and feeds it one input at a time.
///
/// Handler failures (errors and panics alike) are reported as `Fault` events
/// and never stop the loop.
pub struct ControlChannel {
    supervisor: Supervisor,
    notices: mpsc::UnboundedReceiver<WorkerNotice>,
    stimuli: mpsc::Receiver<Stimulus>,
}

impl ControlChannel {
    pub const fn new(
        supervisor: Supervisor,
        notices: mpsc::UnboundedReceiver<WorkerNotice>,
        stimuli: mpsc::Receiver<Stimulus>,
    ) -> Self {
        Self {
            supervisor,
            notices,
            stimuli,
        }
    }

    pub const fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Start the supervisor, then serve until asked to exit.
    ///
    /// Returns the process exit code. When startup fails half-way (the pool
    /// could not be forked completely) the workers that did start are shut
    /// down before the error is returned.
    pub async fn launch(mut self) -> Result<i32, SupervisorError> {
        match self.supervisor.start() {
            Ok(()) => Ok(self.run().await),
            Err(e) if self.supervisor.state() == MasterState::Running => {
                error!(error = %e, "Master failed to start its workers");
                self.shutdown(1).await;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Serve signals and worker notices until a shutdown is requested.
    pub async fn run(mut self) -> i32 {
        loop {
            tokio::select! {
                Some(stimulus) = self.stimuli.recv() => {
                    if let Some(code) = self.handle_stimulus(stimulus) {
                        return self.shutdown(code).await;
                    }
                }
                Some(notice) = self.notices.recv() => self.handle_notice(notice),
                else => {
                    warn!("All control inputs closed");
                    return self.shutdown(1).await;
                }
            }
        }
    }

    /// Dispatch one stimulus. Returns the exit code when it asks the master
    /// to exit.
    pub fn handle_stimulus(&mut self, stimulus: Stimulus) -> Option<i32> {
        match stimulus {
            Stimulus::Shutdown { signal } => {
                info!(%signal, "Shutdown requested");
                Some(0)
            }
            Stimulus::HangUp => {
                self.guard("hangup", |sup| {
                    sup.on_hangup();
                    Ok(())
                });
                None
            }
            Stimulus::Reload => {
                self.guard("reload", Supervisor::reload);
                None
            }
        }
    }

    /// Dispatch one worker notice.
    pub fn handle_notice(&mut self, notice: WorkerNotice) {
        match notice {
            WorkerNotice::Forked { id } => self.guard("fork", |sup| {
                sup.on_forked(id);
                Ok(())
            }),
            WorkerNotice::Message { id, message } => self.guard("message", |sup| {
                match message {
                    ControlMessage::Online => sup.on_online(id),
                    ControlMessage::Listening { address } => sup.on_listening(id, address),
                    ControlMessage::ShutdownAck => sup.on_shutdown_ack(id),
                    ControlMessage::Shutdown => {
                        debug!(worker = %id, "Ignoring shutdown request sent by a worker");
                    }
                }
                Ok(())
            }),
            WorkerNotice::Disconnected { id } => self.guard("disconnect", |sup| {
                sup.on_disconnect(id);
                Ok(())
            }),
            WorkerNotice::Exited { id, code, signal } => {
                self.guard("exit", |sup| sup.on_exit(id, code, signal));
            }
        }
    }

    /// Exit sequence: ask every worker to stop, wait up to the shutdown
    /// grace, force-kill stragglers, then release the pid marker.
    pub async fn shutdown(&mut self, code: i32) -> i32 {
        self.guard("exit", |sup| {
            sup.exit(code);
            Ok(())
        });

        let grace = self.supervisor.settings().shutdown_grace;
        self.drain(grace).await;

        if self.supervisor.worker_count() > 0 {
            let killed = self.supervisor.force_kill_remaining();
            warn!(
                killed,
                grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX),
                "Workers did not exit in time, force-killed"
            );
            self.drain(REAP_TIMEOUT).await;
        }

        if self.supervisor.worker_count() > 0 {
            warn!(
                remaining = self.supervisor.worker_count(),
                "Exiting with unreaped workers"
            );
        }

        self.supervisor.finish(code);
        code
    }

    async fn drain(&mut self, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        while self.supervisor.worker_count() > 0 {
            tokio::select! {
                notice = self.notices.recv() => match notice {
                    Some(notice) => self.handle_notice(notice),
                    None => break,
                },
                Some(stimulus) = self.stimuli.recv() => {
                    if matches!(stimulus, Stimulus::Shutdown { .. }) {
                        warn!("Second shutdown request, not waiting for workers");
                        break;
                    }
                    debug!(?stimulus, "Ignoring stimulus while shutting down");
                }
                () = tokio::time::sleep_until(deadline) => break,
            }
        }
    }

    fn guard<F>(&mut self, what: &str, handler: F)
    where
        F: FnOnce(&mut Supervisor) -> Result<(), SupervisorError>,
    {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(&mut self.supervisor)));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.supervisor.report_fault(format!("{what}: {e}")),
            Err(payload) => self
                .supervisor
                .report_fault(format!("{what} panicked: {}", panic_message(payload.as_ref()))),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flock_core::testing::{
        FakeSignals, FakeSpawner, MemoryPidMarker, ProcessLog, RecordingObserver,
    };
    use flock_core::{SupervisorSettings, WorkerId, WorkerState};
    use std::sync::{Arc, Mutex};

    struct Harness {
        channel: ControlChannel,
        log: Arc<Mutex<ProcessLog>>,
        events: Arc<RecordingObserver>,
        marker: Arc<MemoryPidMarker>,
        notice_tx: mpsc::UnboundedSender<WorkerNotice>,
        stimulus_tx: mpsc::Sender<Stimulus>,
    }

    fn harness(target: usize, spawner: FakeSpawner) -> Harness {
        let settings = SupervisorSettings {
            target_count: target,
            shutdown_grace: Duration::from_millis(20),
            ..SupervisorSettings::with_defaults()
        };
        let log = spawner.log();
        let marker = Arc::new(MemoryPidMarker::new());
        let events = Arc::new(RecordingObserver::new());
        let mut supervisor = Supervisor::new(
            settings,
            Box::new(spawner),
            marker.clone(),
            Arc::new(FakeSignals::new()),
        )
        .with_pid(4242);
        supervisor.subscribe(events.clone());

        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let (stimulus_tx, stimulus_rx) = mpsc::channel(8);
        Harness {
            channel: ControlChannel::new(supervisor, notice_rx, stimulus_rx),
            log,
            events,
            marker,
            notice_tx,
            stimulus_tx,
        }
    }

    fn online(channel: &mut ControlChannel, id: u64) {
        let id = WorkerId::new(id);
        channel.handle_notice(WorkerNotice::Forked { id });
        channel.handle_notice(WorkerNotice::Message {
            id,
            message: ControlMessage::Online,
        });
    }

    #[test]
    fn notices_drive_worker_states() {
        let mut h = harness(2, FakeSpawner::new());
        h.channel.supervisor.start().unwrap();
        online(&mut h.channel, 1);
        h.channel.handle_notice(WorkerNotice::Message {
            id: WorkerId::new(2),
            message: ControlMessage::Listening {
                address: "127.0.0.1:9000".into(),
            },
        });

        let sup = h.channel.supervisor();
        assert_eq!(
            sup.worker(WorkerId::new(1)).unwrap().state(),
            WorkerState::Online
        );
        assert_eq!(
            sup.worker(WorkerId::new(2)).unwrap().state(),
            WorkerState::Listening
        );
    }

    #[test]
    fn hangup_is_notification_only() {
        let mut h = harness(1, FakeSpawner::new());
        h.channel.supervisor.start().unwrap();

        assert_eq!(h.channel.handle_stimulus(Stimulus::HangUp), None);
        assert_eq!(h.channel.supervisor().state(), MasterState::Running);
        assert!(h.events.names().contains(&"hang_up"));
    }

    #[test]
    fn reload_stimulus_replaces_pool() {
        let mut h = harness(2, FakeSpawner::new());
        h.channel.supervisor.start().unwrap();

        assert_eq!(h.channel.handle_stimulus(Stimulus::Reload), None);
        assert_eq!(FakeSpawner::spawned(&h.log).len(), 4);
    }

    #[test]
    fn handler_errors_become_faults() {
        let mut h = harness(1, FakeSpawner::new().failing_after(1));
        h.channel.supervisor.start().unwrap();

        // Unplanned exit triggers a restore, which fails to spawn.
        h.channel.handle_notice(WorkerNotice::Exited {
            id: WorkerId::new(1),
            code: Some(1),
            signal: None,
        });

        assert_eq!(h.channel.supervisor().state(), MasterState::Running);
        assert_eq!(h.events.names().last(), Some(&"fault"));
    }

    #[test]
    fn panics_are_contained() {
        let mut h = harness(1, FakeSpawner::new());
        h.channel.guard("test", |_| panic!("handler blew up"));

        let last = h.events.events().pop().unwrap();
        assert_eq!(
            last,
            flock_core::SupervisorEvent::Fault {
                message: "test panicked: handler blew up".into()
            }
        );
    }

    #[tokio::test]
    async fn shutdown_waits_for_exits_then_finishes() {
        let mut h = harness(2, FakeSpawner::new());
        h.channel.supervisor.start().unwrap();

        for id in [1, 2] {
            h.notice_tx
                .send(WorkerNotice::Exited {
                    id: WorkerId::new(id),
                    code: Some(0),
                    signal: None,
                })
                .unwrap();
        }

        assert_eq!(h.channel.shutdown(0).await, 0);
        assert_eq!(h.channel.supervisor().worker_count(), 0);
        assert!(FakeSpawner::signals_for(&h.log, WorkerId::new(1)).is_empty());
        assert_eq!(h.marker.current(), None);
        assert_eq!(h.events.names().last(), Some(&"master_exited"));
    }

    #[tokio::test]
    async fn shutdown_escalates_after_grace() {
        let mut h = harness(1, FakeSpawner::new());
        h.channel.supervisor.start().unwrap();

        assert_eq!(h.channel.shutdown(0).await, 0);
        assert_eq!(
            FakeSpawner::signals_for(&h.log, WorkerId::new(1)),
            vec![flock_core::Signal::Kill]
        );
        assert_eq!(h.marker.current(), None);
    }

    #[tokio::test]
    async fn run_returns_on_shutdown_stimulus() {
        let h = harness(0, FakeSpawner::new());
        h.stimulus_tx
            .send(Stimulus::Shutdown {
                signal: flock_core::Signal::Terminate,
            })
            .await
            .unwrap();

        let code = h.channel.launch().await.unwrap();
        assert_eq!(code, 0);
        assert!(h.events.names().contains(&"stopping"));
        assert_eq!(h.marker.current(), None);
    }
}
