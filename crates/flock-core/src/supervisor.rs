//! The master: owns the worker pool and its state machine.
//!
//! `Supervisor` is a plain synchronous state machine. Every method runs to
//! completion without awaiting, and the runtime calls them from a single task,
//! so each call is atomic with respect to every other. Process effects go
//! through the ports handed in at construction; results come back later as
//! calls to the `on_*` handlers.
//!
//! # Worker lifecycle
//!
//! ```text
//! fork() ─► Init ─► Created ─► Online ─► Listening
//!                │        │         │         │
//!                └────────┴────┬────┴─────────┘
//!                              ▼
//!              Closing (resize/reload/exit) ─► Disconnected ─► removed on exit
//! ```

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::SupervisorError;
use crate::events::{ExitDisposition, SupervisorEvent};
use crate::ports::{PidMarkerPort, ProcessSignalPort, ProcessSpawner, SupervisorObserver};
use crate::protocol::ControlMessage;
use crate::services::running_master;
use crate::settings::SupervisorSettings;
use crate::signal::Signal;
use crate::state::{MasterState, WorkerState};
use crate::worker::{WorkerId, WorkerRecord, WorkerSummary};

/// Mutable master status, owned exclusively by the supervisor.
#[derive(Debug)]
struct MasterStatus {
    state: MasterState,
    target_count: usize,
    workers: BTreeMap<WorkerId, WorkerRecord>,
}

/// Serializable view of the whole pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSnapshot {
    pub pid: u32,
    pub state: MasterState,
    pub target_count: usize,
    pub active_count: usize,
    pub workers: Vec<WorkerSummary>,
}

/// Owner of the worker pool.
pub struct Supervisor {
    settings: SupervisorSettings,
    status: MasterStatus,
    spawner: Box<dyn ProcessSpawner>,
    marker: Arc<dyn PidMarkerPort>,
    signals: Arc<dyn ProcessSignalPort>,
    observers: Vec<Arc<dyn SupervisorObserver>>,
    pid: u32,
    next_id: u64,
}

impl Supervisor {
    /// Create a supervisor for the current process.
    pub fn new(
        settings: SupervisorSettings,
        spawner: Box<dyn ProcessSpawner>,
        marker: Arc<dyn PidMarkerPort>,
        signals: Arc<dyn ProcessSignalPort>,
    ) -> Self {
        Self {
            settings,
            status: MasterStatus {
                state: MasterState::Init,
                target_count: 0,
                workers: BTreeMap::new(),
            },
            spawner,
            marker,
            signals,
            observers: Vec::new(),
            pid: std::process::id(),
            next_id: 1,
        }
    }

    /// Override the pid this master records in the marker.
    #[must_use]
    pub const fn with_pid(mut self, pid: u32) -> Self {
        self.pid = pid;
        self
    }

    /// Register an observer for every subsequent event.
    pub fn subscribe(&mut self, observer: Arc<dyn SupervisorObserver>) {
        self.observers.push(observer);
    }

    pub const fn settings(&self) -> &SupervisorSettings {
        &self.settings
    }

    pub const fn state(&self) -> MasterState {
        self.status.state
    }

    pub const fn target_count(&self) -> usize {
        self.status.target_count
    }

    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// Workers in `Init`, `Created`, `Online` or `Listening`.
    pub fn active_count(&self) -> usize {
        self.status
            .workers
            .values()
            .filter(|record| record.state().is_active())
            .count()
    }

    /// All records, including ones that are closing or disconnected.
    pub fn worker_count(&self) -> usize {
        self.status.workers.len()
    }

    pub fn worker(&self, id: WorkerId) -> Option<&WorkerRecord> {
        self.status.workers.get(&id)
    }

    /// Records in ascending id order.
    pub fn workers(&self) -> impl Iterator<Item = &WorkerRecord> {
        self.status.workers.values()
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            pid: self.pid,
            state: self.status.state,
            target_count: self.status.target_count,
            active_count: self.active_count(),
            workers: self.workers().map(WorkerRecord::summary).collect(),
        }
    }

    /// Take ownership of the pid marker and fork the initial pool.
    ///
    /// Refuses with `AlreadyRunning` (and forks nothing) when the marker names
    /// another live process. A marker write failure is logged and ignored:
    /// the master runs, it just cannot be found by later `stop`/`reload` calls.
    pub fn start(&mut self) -> Result<(), SupervisorError> {
        if self.status.state != MasterState::Init {
            return Err(SupervisorError::InvalidTransition {
                from: self.status.state,
                to: MasterState::Running,
            });
        }

        if let Some(pid) = running_master(self.marker.as_ref(), self.signals.as_ref())
            && pid != self.pid
        {
            warn!(pid, "Master already running");
            return Err(SupervisorError::AlreadyRunning { pid });
        }

        self.write_pid_marker();
        self.transition(MasterState::Running)?;

        let target = self.settings.target_count;
        info!(pid = self.pid, target, "Master started");
        self.emit(&SupervisorEvent::Started {
            pid: self.pid,
            target,
        });

        self.resize(target)
    }

    /// Bring the pool to `target` workers.
    ///
    /// Growing forks the difference right away. Shrinking asks the oldest
    /// active workers to shut down and marks them `Closing`; they leave the
    /// map once their exit is confirmed.
    pub fn resize(&mut self, target: usize) -> Result<(), SupervisorError> {
        let active = self.active_count();
        let previous = self.status.target_count;
        self.status.target_count = target;

        if previous != target {
            self.emit(&SupervisorEvent::Resized {
                from: previous,
                to: target,
            });
        }

        match target.cmp(&active) {
            Ordering::Equal => {
                debug!(target, "Worker pool already at target size");
                Ok(())
            }
            Ordering::Greater => {
                info!(from = active, to = target, "Growing worker pool");
                self.fork(target - active).map(|_| ())
            }
            Ordering::Less => {
                info!(from = active, to = target, "Shrinking worker pool");
                self.shrink(active - target);
                Ok(())
            }
        }
    }

    /// Spawn `count` workers, each recorded in `Init` under a fresh id.
    ///
    /// Stops at the first spawn failure; workers forked before it are kept.
    /// Does nothing once the master is closing.
    pub fn fork(&mut self, count: usize) -> Result<Vec<WorkerId>, SupervisorError> {
        if self.status.state == MasterState::Closing {
            warn!(count, "Master is closing, not forking");
            return Ok(Vec::new());
        }

        let mut forked = Vec::with_capacity(count);
        for _ in 0..count {
            let id = WorkerId::new(self.next_id);
            self.next_id += 1;

            let handle = self.spawner.spawn(id).map_err(|e| {
                error!(worker = %id, error = %e, "Failed to fork worker");
                SupervisorError::Spawn(e)
            })?;

            let record = WorkerRecord::new(id, handle);
            let pid = record.pid();
            info!(worker = %id, pid = ?pid, "Worker forked");
            self.status.workers.insert(id, record);
            self.emit(&SupervisorEvent::WorkerForked { id, pid });
            forked.push(id);
        }

        Ok(forked)
    }

    /// Ask every active worker to shut down.
    pub fn kill_all(&mut self) -> Result<(), SupervisorError> {
        info!(active = self.active_count(), "Shutting down all workers");
        self.resize(0)
    }

    /// Replace the whole pool: shut every worker down and fork a full new set
    /// immediately, without waiting for the old ones to exit.
    ///
    /// `target_count` is left alone, so no `Resized` event is emitted.
    pub fn reload(&mut self) -> Result<(), SupervisorError> {
        if self.status.state != MasterState::Running {
            warn!(state = %self.status.state, "Reload ignored, master not running");
            return Ok(());
        }

        let target = self.status.target_count;
        info!(target, "Reloading worker pool");
        self.emit(&SupervisorEvent::Reloading { target });

        self.shrink(self.active_count());
        self.fork(target).map(|_| ())
    }

    /// Enter `Closing` and tell every worker to shut down.
    ///
    /// The caller owns actually ending the process once the pool drained
    /// (or the grace period ran out) and must then call [`finish`](Self::finish).
    pub fn exit(&mut self, code: i32) {
        if self.status.state == MasterState::Closing {
            debug!(code, "Exit already in progress");
            return;
        }

        info!(code, "Master exiting");
        self.status.state = MasterState::Closing;
        self.emit(&SupervisorEvent::Stopping { code });

        if let Err(e) = self.kill_all() {
            warn!(error = %e, "Failed to shut down workers cleanly");
        }
    }

    /// Escalate to `SIGKILL` for every worker still known. Returns how many
    /// were signalled.
    pub fn force_kill_remaining(&mut self) -> usize {
        let mut signalled = 0;
        for record in self.status.workers.values() {
            match record.handle().signal(Signal::Kill) {
                Ok(()) => {
                    warn!(worker = %record.id(), pid = ?record.pid(), "Worker force-killed");
                    signalled += 1;
                }
                Err(e) => {
                    debug!(worker = %record.id(), error = %e, "Force kill failed, worker likely gone");
                }
            }
        }
        signalled
    }

    /// Release the pid marker and emit the final notification.
    pub fn finish(&mut self, code: i32) {
        self.status.state = MasterState::Closing;
        self.remove_pid_marker();
        info!(code, "Master exited");
        self.emit(&SupervisorEvent::MasterExited { code });
    }

    /// Log and surface a contained fault. Never changes state.
    pub fn report_fault(&self, message: impl Into<String>) {
        let message = message.into();
        error!(fault = %message, "Uncaught fault in master");
        self.emit(&SupervisorEvent::Fault { message });
    }

    // ========== Worker lifecycle handlers ==========

    /// The worker process exists.
    pub fn on_forked(&mut self, id: WorkerId) {
        if self.confirm(id, WorkerState::Created) {
            debug!(worker = %id, "Worker process confirmed");
        }
    }

    /// The worker announced itself over its message channel.
    pub fn on_online(&mut self, id: WorkerId) {
        if self.confirm(id, WorkerState::Online) {
            info!(worker = %id, "Worker online");
            self.emit(&SupervisorEvent::WorkerOnline { id });
        }
    }

    /// The worker bound a socket.
    pub fn on_listening(&mut self, id: WorkerId, address: String) {
        if let Some(record) = self.status.workers.get_mut(&id)
            && record.state().is_active()
        {
            record.set_address(address.clone());
        }

        if self.confirm(id, WorkerState::Listening) {
            info!(worker = %id, %address, "Worker listening");
            self.emit(&SupervisorEvent::WorkerListening { id, address });
        }
    }

    /// The worker confirmed a shutdown request. The ack may be read after
    /// the exit was already handled.
    pub fn on_shutdown_ack(&self, id: WorkerId) {
        debug!(
            worker = %id,
            known = self.status.workers.contains_key(&id),
            "Worker acknowledged shutdown"
        );
        self.emit(&SupervisorEvent::WorkerShutdownAcknowledged { id });
    }

    /// The worker's message channel closed.
    ///
    /// The exit notification may already have removed the record; that is
    /// expected and only logged.
    pub fn on_disconnect(&mut self, id: WorkerId) {
        match self.status.workers.get_mut(&id) {
            Some(record) => {
                record.advance(WorkerState::Disconnected);
                info!(worker = %id, planned = record.planned_exit(), "Worker disconnected");
            }
            None => debug!(worker = %id, "Worker disconnected after exit"),
        }
        self.emit(&SupervisorEvent::WorkerDisconnected { id });
    }

    /// The worker process exit was confirmed by the OS.
    ///
    /// Removes the record and, with auto-restore on, forks exactly one
    /// replacement when the death was not requested by the master.
    pub fn on_exit(
        &mut self,
        id: WorkerId,
        code: Option<i32>,
        signal: Option<i32>,
    ) -> Result<(), SupervisorError> {
        let Some(record) = self.status.workers.remove(&id) else {
            debug!(worker = %id, "Exit for unknown worker ignored");
            return Ok(());
        };

        let disposition = ExitDisposition::classify(code, signal);
        let uptime_ms = (chrono::Utc::now() - record.forked_at()).num_milliseconds();
        match disposition {
            ExitDisposition::SignalExit => {
                warn!(worker = %id, signal = ?signal, uptime_ms, "Worker exited with signal");
            }
            ExitDisposition::ErrorExit => {
                warn!(worker = %id, code = ?code, uptime_ms, "Worker exited with error");
            }
            ExitDisposition::CleanExit => {
                info!(worker = %id, uptime_ms, "Worker exited cleanly");
            }
        }

        self.emit(&SupervisorEvent::WorkerExited {
            id,
            code,
            signal,
            disposition,
        });

        if self.should_restore(&record) {
            info!(worker = %id, "Restoring pool after unplanned worker exit");
            self.fork(1)?;
        }

        Ok(())
    }

    /// `SIGHUP`: notification only.
    pub fn on_hangup(&self) {
        warn!(
            active = self.active_count(),
            target = self.status.target_count,
            "SIGHUP received"
        );
        self.emit(&SupervisorEvent::HangUp);
    }

    // ========== Internals ==========

    fn should_restore(&self, record: &WorkerRecord) -> bool {
        self.settings.auto_restore
            && self.status.state == MasterState::Running
            && !record.planned_exit()
            && self.active_count() < self.status.target_count
    }

    fn shrink(&mut self, count: usize) {
        let victims: Vec<WorkerId> = self
            .status
            .workers
            .values()
            .filter(|record| record.state().is_active())
            .take(count)
            .map(WorkerRecord::id)
            .collect();

        for id in victims {
            let Some(record) = self.status.workers.get_mut(&id) else {
                continue;
            };
            if let Err(e) = record.handle().send(&ControlMessage::Shutdown) {
                warn!(worker = %id, error = %e, "Failed to deliver shutdown message");
            }
            record.mark_closing();
            debug!(worker = %id, "Worker asked to shut down");
        }
    }

    fn confirm(&mut self, id: WorkerId, next: WorkerState) -> bool {
        let Some(record) = self.status.workers.get_mut(&id) else {
            debug!(worker = %id, state = %next, "Confirmation for unknown worker ignored");
            return false;
        };

        let from = record.state();
        if record.advance(next) {
            true
        } else {
            debug!(worker = %id, %from, to = %next, "Ignoring out-of-order worker transition");
            false
        }
    }

    fn transition(&mut self, next: MasterState) -> Result<(), SupervisorError> {
        let from = self.status.state;
        if !from.can_transition_to(next) {
            return Err(SupervisorError::InvalidTransition { from, to: next });
        }
        debug!(%from, to = %next, "Master state transition");
        self.status.state = next;
        Ok(())
    }

    fn write_pid_marker(&self) {
        match self.marker.write(self.pid) {
            Ok(()) => info!(pid = self.pid, path = %self.marker.location(), "Pid marker written"),
            Err(e) => warn!(
                pid = self.pid,
                path = %self.marker.location(),
                error = %e,
                "Failed to write pid marker, master will not be discoverable"
            ),
        }
    }

    fn remove_pid_marker(&self) {
        match self.marker.read() {
            Ok(Some(pid)) if pid != self.pid => {
                warn!(pid, "Pid marker belongs to another master, leaving it");
            }
            _ => {
                if let Err(e) = self.marker.remove() {
                    warn!(error = %e, "Failed to remove pid marker");
                }
            }
        }
    }

    fn emit(&self, event: &SupervisorEvent) {
        for observer in &self.observers {
            observer.on_event(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        FakeSignals, FakeSpawner, MemoryPidMarker, ProcessLog, RecordingObserver,
    };
    use std::sync::Mutex;

    const MASTER_PID: u32 = 1234;

    struct Harness {
        sup: Supervisor,
        log: Arc<Mutex<ProcessLog>>,
        events: Arc<RecordingObserver>,
        marker: Arc<MemoryPidMarker>,
    }

    fn harness_with(
        target: usize,
        auto_restore: bool,
        spawner: FakeSpawner,
        marker: MemoryPidMarker,
        signals: FakeSignals,
    ) -> Harness {
        let settings = SupervisorSettings {
            target_count: target,
            auto_restore,
            ..SupervisorSettings::with_defaults()
        };
        let log = spawner.log();
        let marker = Arc::new(marker);
        let events = Arc::new(RecordingObserver::new());
        let mut sup = Supervisor::new(
            settings,
            Box::new(spawner),
            marker.clone(),
            Arc::new(signals),
        )
        .with_pid(MASTER_PID);
        sup.subscribe(events.clone());

        Harness {
            sup,
            log,
            events,
            marker,
        }
    }

    fn harness(target: usize) -> Harness {
        harness_with(
            target,
            true,
            FakeSpawner::new(),
            MemoryPidMarker::new(),
            FakeSignals::new(),
        )
    }

    fn ids(sup: &Supervisor) -> Vec<WorkerId> {
        sup.workers().map(WorkerRecord::id).collect()
    }

    fn bring_online(sup: &mut Supervisor) {
        for id in ids(sup) {
            sup.on_forked(id);
            sup.on_online(id);
        }
    }

    #[test]
    fn start_forks_target_and_writes_marker() {
        let mut h = harness(4);
        h.sup.start().unwrap();

        assert_eq!(h.sup.state(), MasterState::Running);
        assert_eq!(h.sup.worker_count(), 4);
        assert!(h.sup.workers().all(|r| r.state() == WorkerState::Init));
        assert_eq!(h.marker.current(), Some(MASTER_PID));
        assert_eq!(h.events.names()[0], "started");
    }

    #[test]
    fn start_with_four_workers_reaches_online() {
        let mut h = harness(4);
        h.sup.start().unwrap();
        bring_online(&mut h.sup);
        h.sup.on_listening(WorkerId::new(2), "127.0.0.1:4000".into());

        let live = h
            .sup
            .workers()
            .filter(|r| matches!(r.state(), WorkerState::Online | WorkerState::Listening))
            .count();
        assert_eq!(live, 4);
        assert_eq!(
            h.sup.worker(WorkerId::new(2)).unwrap().address(),
            Some("127.0.0.1:4000")
        );
    }

    #[test]
    fn start_refuses_against_live_master() {
        let mut h = harness_with(
            3,
            true,
            FakeSpawner::new(),
            MemoryPidMarker::holding(999),
            FakeSignals::with_alive([999]),
        );

        let err = h.sup.start().unwrap_err();
        assert_eq!(err, SupervisorError::AlreadyRunning { pid: 999 });
        assert!(FakeSpawner::spawned(&h.log).is_empty());
        assert_eq!(h.sup.state(), MasterState::Init);
        assert_eq!(h.marker.current(), Some(999));
    }

    #[test]
    fn start_replaces_stale_marker() {
        let mut h = harness_with(
            1,
            true,
            FakeSpawner::new(),
            MemoryPidMarker::holding(999),
            FakeSignals::new(),
        );

        h.sup.start().unwrap();
        assert_eq!(h.marker.current(), Some(MASTER_PID));
    }

    #[test]
    fn start_survives_unwritable_marker() {
        let mut h = harness_with(
            2,
            true,
            FakeSpawner::new(),
            MemoryPidMarker::read_only(),
            FakeSignals::new(),
        );

        h.sup.start().unwrap();
        assert_eq!(h.sup.worker_count(), 2);
        assert_eq!(h.marker.current(), None);
    }

    #[test]
    fn start_twice_is_rejected() {
        let mut h = harness(1);
        h.sup.start().unwrap();
        assert!(matches!(
            h.sup.start(),
            Err(SupervisorError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn fork_creates_unique_init_records() {
        let mut h = harness(0);
        let first = h.sup.fork(3).unwrap();
        let second = h.sup.fork(2).unwrap();

        let mut all: Vec<_> = first.iter().chain(second.iter()).copied().collect();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 5);
        for id in &second {
            assert_eq!(h.sup.worker(*id).unwrap().state(), WorkerState::Init);
        }
    }

    #[test]
    fn ids_are_never_reused() {
        let mut h = harness(1);
        h.sup.start().unwrap();
        let first = ids(&h.sup)[0];
        h.sup.on_exit(first, Some(1), None).unwrap();

        let replacement = ids(&h.sup)[0];
        assert!(replacement > first);
    }

    #[test]
    fn resize_grows_then_shrinks_oldest_first() {
        let mut h = harness(0);
        h.sup.resize(3).unwrap();
        assert_eq!(h.sup.active_count(), 3);

        h.sup.resize(1).unwrap();
        assert_eq!(h.sup.active_count(), 1);
        assert_eq!(h.sup.target_count(), 1);

        for id in [WorkerId::new(1), WorkerId::new(2)] {
            let record = h.sup.worker(id).unwrap();
            assert_eq!(record.state(), WorkerState::Closing);
            assert_eq!(
                FakeSpawner::messages_for(&h.log, id),
                vec![ControlMessage::Shutdown]
            );
        }
        assert_eq!(
            h.sup.worker(WorkerId::new(3)).unwrap().state(),
            WorkerState::Init
        );
    }

    #[test]
    fn resize_is_idempotent() {
        let mut h = harness(0);
        h.sup.resize(2).unwrap();
        h.sup.resize(2).unwrap();
        assert_eq!(FakeSpawner::spawned(&h.log).len(), 2);

        h.sup.resize(1).unwrap();
        h.sup.resize(1).unwrap();
        let shutdowns: usize = ids(&h.sup)
            .into_iter()
            .map(|id| FakeSpawner::messages_for(&h.log, id).len())
            .sum();
        assert_eq!(shutdowns, 1);
    }

    #[test]
    fn record_removed_only_on_exit_confirmation() {
        let mut h = harness(1);
        h.sup.start().unwrap();
        let id = ids(&h.sup)[0];

        h.sup.on_disconnect(id);
        assert_eq!(h.sup.worker(id).unwrap().state(), WorkerState::Disconnected);

        h.sup.on_exit(id, Some(0), None).unwrap();
        assert!(h.sup.worker(id).is_none());
    }

    #[test]
    fn disconnect_after_exit_is_tolerated() {
        let mut h = harness_with(
            1,
            false,
            FakeSpawner::new(),
            MemoryPidMarker::new(),
            FakeSignals::new(),
        );
        h.sup.start().unwrap();
        let id = ids(&h.sup)[0];

        h.sup.on_exit(id, Some(0), None).unwrap();
        h.sup.on_disconnect(id);
        assert_eq!(h.sup.worker_count(), 0);
        assert!(h.events.names().contains(&"worker_disconnected"));
    }

    #[test]
    fn unplanned_exit_restores_exactly_one() {
        let mut h = harness(2);
        h.sup.start().unwrap();
        bring_online(&mut h.sup);
        let victim = ids(&h.sup)[0];

        h.sup.on_disconnect(victim);
        assert_eq!(FakeSpawner::spawned(&h.log).len(), 2);

        h.sup.on_exit(victim, Some(1), None).unwrap();
        assert_eq!(FakeSpawner::spawned(&h.log).len(), 3);
        assert_eq!(h.sup.active_count(), 2);
    }

    #[test]
    fn planned_exit_does_not_restore() {
        let mut h = harness(2);
        h.sup.start().unwrap();
        bring_online(&mut h.sup);

        h.sup.resize(1).unwrap();
        let closing = WorkerId::new(1);
        h.sup.on_disconnect(closing);
        h.sup.on_exit(closing, Some(0), None).unwrap();

        assert_eq!(FakeSpawner::spawned(&h.log).len(), 2);
        assert_eq!(h.sup.worker_count(), 1);
    }

    #[test]
    fn no_restore_when_disabled() {
        let mut h = harness_with(
            2,
            false,
            FakeSpawner::new(),
            MemoryPidMarker::new(),
            FakeSignals::new(),
        );
        h.sup.start().unwrap();
        h.sup.on_exit(WorkerId::new(1), None, Some(9)).unwrap();

        assert_eq!(FakeSpawner::spawned(&h.log).len(), 2);
        assert_eq!(h.sup.active_count(), 1);
    }

    #[test]
    fn no_restore_while_closing() {
        let mut h = harness(2);
        h.sup.start().unwrap();
        h.sup.exit(0);

        for id in ids(&h.sup) {
            assert_eq!(
                FakeSpawner::messages_for(&h.log, id),
                vec![ControlMessage::Shutdown]
            );
            h.sup.on_exit(id, Some(0), None).unwrap();
        }

        assert_eq!(FakeSpawner::spawned(&h.log).len(), 2);
        assert_eq!(h.sup.worker_count(), 0);
        assert_eq!(h.sup.state(), MasterState::Closing);
    }

    #[test]
    fn reload_replaces_whole_pool() {
        let mut h = harness(4);
        h.sup.start().unwrap();
        bring_online(&mut h.sup);
        let old = ids(&h.sup);

        h.sup.reload().unwrap();

        for id in &old {
            assert_eq!(h.sup.worker(*id).unwrap().state(), WorkerState::Closing);
            assert_eq!(
                FakeSpawner::messages_for(&h.log, *id),
                vec![ControlMessage::Shutdown]
            );
        }
        assert_eq!(FakeSpawner::spawned(&h.log).len(), 8);
        assert_eq!(h.sup.active_count(), 4);
        assert_eq!(h.sup.target_count(), 4);

        for id in &old {
            h.sup.on_disconnect(*id);
            h.sup.on_exit(*id, Some(0), None).unwrap();
        }

        assert_eq!(h.sup.worker_count(), 4);
        assert!(ids(&h.sup).iter().all(|id| !old.contains(id)));
        assert_eq!(FakeSpawner::spawned(&h.log).len(), 8);
        assert!(h.events.names().contains(&"reloading"));
    }

    #[test]
    fn reload_keeps_target_count() {
        let mut h = harness(3);
        h.sup.start().unwrap();
        bring_online(&mut h.sup);
        let before = h.events.events().len();

        h.sup.reload().unwrap();

        let during: Vec<_> = h.events.events().split_off(before);
        assert!(
            !during
                .iter()
                .any(|e| matches!(e, SupervisorEvent::Resized { .. })),
            "unexpected resize in {during:?}"
        );
        assert_eq!(
            during.first(),
            Some(&SupervisorEvent::Reloading { target: 3 })
        );
        assert_eq!(
            during
                .iter()
                .filter(|e| e.name() == "worker_forked")
                .count(),
            3
        );
        assert_eq!(h.sup.target_count(), 3);
    }

    #[test]
    fn reload_before_start_is_ignored() {
        let mut h = harness(2);
        h.sup.reload().unwrap();
        assert!(FakeSpawner::spawned(&h.log).is_empty());
    }

    #[test]
    fn exit_reports_disposition() {
        let mut h = harness_with(
            3,
            false,
            FakeSpawner::new(),
            MemoryPidMarker::new(),
            FakeSignals::new(),
        );
        h.sup.start().unwrap();
        h.sup.on_exit(WorkerId::new(1), None, Some(9)).unwrap();
        h.sup.on_exit(WorkerId::new(2), Some(3), None).unwrap();
        h.sup.on_exit(WorkerId::new(3), Some(0), None).unwrap();

        let dispositions: Vec<_> = h
            .events
            .events()
            .into_iter()
            .filter_map(|e| match e {
                SupervisorEvent::WorkerExited { disposition, .. } => Some(disposition),
                _ => None,
            })
            .collect();
        assert_eq!(
            dispositions,
            vec![
                ExitDisposition::SignalExit,
                ExitDisposition::ErrorExit,
                ExitDisposition::CleanExit
            ]
        );
    }

    #[test]
    fn late_online_for_closing_worker_is_ignored() {
        let mut h = harness(1);
        h.sup.start().unwrap();
        h.sup.kill_all().unwrap();
        h.sup.on_online(WorkerId::new(1));

        assert_eq!(
            h.sup.worker(WorkerId::new(1)).unwrap().state(),
            WorkerState::Closing
        );
        assert!(!h.events.names().contains(&"worker_online"));
    }

    #[test]
    fn spawn_failure_keeps_earlier_workers() {
        let mut h = harness_with(
            4,
            true,
            FakeSpawner::new().failing_after(2),
            MemoryPidMarker::new(),
            FakeSignals::new(),
        );

        let err = h.sup.start().unwrap_err();
        assert!(matches!(err, SupervisorError::Spawn(_)));
        assert_eq!(h.sup.worker_count(), 2);
        assert_eq!(h.sup.state(), MasterState::Running);
    }

    #[test]
    fn exit_is_final() {
        let mut h = harness(1);
        h.sup.start().unwrap();
        h.sup.exit(0);
        h.sup.exit(1);

        assert_eq!(h.sup.fork(2).unwrap(), Vec::new());
        let stopping = h.events.names().iter().filter(|n| **n == "stopping").count();
        assert_eq!(stopping, 1);
    }

    #[test]
    fn force_kill_targets_remaining_workers() {
        let mut h = harness(2);
        h.sup.start().unwrap();
        h.sup.exit(0);
        h.sup.on_exit(WorkerId::new(1), Some(0), None).unwrap();

        assert_eq!(h.sup.force_kill_remaining(), 1);
        assert_eq!(
            FakeSpawner::signals_for(&h.log, WorkerId::new(2)),
            vec![Signal::Kill]
        );
        assert!(FakeSpawner::signals_for(&h.log, WorkerId::new(1)).is_empty());
    }

    #[test]
    fn finish_removes_own_marker() {
        let mut h = harness(1);
        h.sup.start().unwrap();
        h.sup.exit(0);
        h.sup.finish(0);

        assert_eq!(h.marker.current(), None);
        assert_eq!(h.events.names().last(), Some(&"master_exited"));
    }

    #[test]
    fn finish_leaves_foreign_marker() {
        let mut h = harness(1);
        h.sup.start().unwrap();
        h.marker.write(4321).unwrap();
        h.sup.finish(0);

        assert_eq!(h.marker.current(), Some(4321));
    }

    #[test]
    fn hangup_only_notifies() {
        let mut h = harness(2);
        h.sup.start().unwrap();
        let before = h.sup.snapshot();
        h.sup.on_hangup();

        assert_eq!(h.sup.snapshot(), before);
        assert_eq!(h.events.names().last(), Some(&"hang_up"));
    }

    #[test]
    fn fault_is_reported_without_state_change() {
        let mut h = harness(1);
        h.sup.start().unwrap();
        h.sup.report_fault("boom");

        assert_eq!(h.sup.state(), MasterState::Running);
        assert_eq!(
            h.events.events().last(),
            Some(&SupervisorEvent::Fault {
                message: "boom".into()
            })
        );
    }

    #[test]
    fn snapshot_serializes() {
        let mut h = harness(1);
        h.sup.start().unwrap();
        let json = serde_json::to_string(&h.sup.snapshot()).unwrap();
        assert!(json.contains("\"targetCount\":1"));
        assert!(json.contains("\"state\":\"running\""));
    }
}
