//! In-memory fakes of every port, for tests.
//!
//! Enabled for this crate's own tests and, through the `test-utils` feature,
//! for downstream crates. Every fake records what was asked of it so tests can
//! assert on the supervisor's side effects without real processes.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::SupervisorError;
use crate::events::SupervisorEvent;
use crate::ports::{
    PidMarkerPort, ProcessError, ProcessHandle, ProcessSignalPort, ProcessSpawner,
    SupervisorObserver,
};
use crate::protocol::ControlMessage;
use crate::signal::Signal;
use crate::worker::WorkerId;

/// First pid handed out by [`FakeSpawner`]; worker `n` gets `FAKE_PID_BASE + n`.
pub const FAKE_PID_BASE: u32 = 40_000;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What the fake processes were asked to do.
#[derive(Debug, Default)]
pub struct ProcessLog {
    pub spawned: Vec<WorkerId>,
    pub messages: BTreeMap<WorkerId, Vec<ControlMessage>>,
    pub signals: BTreeMap<WorkerId, Vec<Signal>>,
}

/// A [`ProcessSpawner`] that never starts anything.
#[derive(Debug, Clone, Default)]
pub struct FakeSpawner {
    log: Arc<Mutex<ProcessLog>>,
    fail_after: Option<usize>,
}

impl FakeSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Succeed `count` times, then fail every spawn.
    #[must_use]
    pub fn failing_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    /// Shared log, still readable after the spawner moved into a supervisor.
    pub fn log(&self) -> Arc<Mutex<ProcessLog>> {
        Arc::clone(&self.log)
    }

    pub fn spawned(log: &Arc<Mutex<ProcessLog>>) -> Vec<WorkerId> {
        lock(log).spawned.clone()
    }

    pub fn messages_for(log: &Arc<Mutex<ProcessLog>>, id: WorkerId) -> Vec<ControlMessage> {
        lock(log).messages.get(&id).cloned().unwrap_or_default()
    }

    pub fn signals_for(log: &Arc<Mutex<ProcessLog>>, id: WorkerId) -> Vec<Signal> {
        lock(log).signals.get(&id).cloned().unwrap_or_default()
    }
}

impl ProcessSpawner for FakeSpawner {
    fn spawn(&mut self, id: WorkerId) -> Result<Box<dyn ProcessHandle>, ProcessError> {
        let mut log = lock(&self.log);
        if self.fail_after.is_some_and(|limit| log.spawned.len() >= limit) {
            return Err(ProcessError::SpawnFailed("fake spawn limit reached".into()));
        }
        log.spawned.push(id);

        Ok(Box::new(FakeHandle {
            id,
            log: Arc::clone(&self.log),
        }))
    }
}

/// Handle returned by [`FakeSpawner`].
#[derive(Debug)]
pub struct FakeHandle {
    id: WorkerId,
    log: Arc<Mutex<ProcessLog>>,
}

impl ProcessHandle for FakeHandle {
    fn pid(&self) -> Option<u32> {
        u32::try_from(self.id.get())
            .ok()
            .map(|n| FAKE_PID_BASE + n)
    }

    fn send(&self, message: &ControlMessage) -> Result<(), ProcessError> {
        lock(&self.log)
            .messages
            .entry(self.id)
            .or_default()
            .push(message.clone());
        Ok(())
    }

    fn signal(&self, signal: Signal) -> Result<(), ProcessError> {
        lock(&self.log)
            .signals
            .entry(self.id)
            .or_default()
            .push(signal);
        Ok(())
    }
}

/// A pid marker held in memory.
#[derive(Debug, Default)]
pub struct MemoryPidMarker {
    pid: Mutex<Option<u32>>,
    fail_writes: bool,
}

impl MemoryPidMarker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn holding(pid: u32) -> Self {
        Self {
            pid: Mutex::new(Some(pid)),
            fail_writes: false,
        }
    }

    /// Every `write` fails, like an unwritable directory.
    pub fn read_only() -> Self {
        Self {
            pid: Mutex::new(None),
            fail_writes: true,
        }
    }

    pub fn current(&self) -> Option<u32> {
        *lock(&self.pid)
    }
}

impl PidMarkerPort for MemoryPidMarker {
    fn read(&self) -> Result<Option<u32>, SupervisorError> {
        Ok(self.current())
    }

    fn write(&self, pid: u32) -> Result<(), SupervisorError> {
        if self.fail_writes {
            return Err(SupervisorError::PidFileIo("read-only marker".into()));
        }
        *lock(&self.pid) = Some(pid);
        Ok(())
    }

    fn remove(&self) -> Result<(), SupervisorError> {
        *lock(&self.pid) = None;
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

/// A process table with a fixed set of live pids.
#[derive(Debug, Default)]
pub struct FakeSignals {
    alive: Mutex<HashSet<u32>>,
    delivered: Mutex<Vec<(u32, Signal)>>,
    exits_on: Option<Signal>,
    lingers_for: u32,
    lingering: Mutex<HashMap<u32, u32>>,
    deny: bool,
}

impl FakeSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alive(pids: impl IntoIterator<Item = u32>) -> Self {
        Self {
            alive: Mutex::new(pids.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Processes die as soon as they receive `signal`.
    #[must_use]
    pub fn exiting_on(mut self, signal: Signal) -> Self {
        self.exits_on = Some(signal);
        self
    }

    /// Like [`exiting_on`](Self::exiting_on), but the process only goes away
    /// after `checks` more liveness checks, like a master draining its pool.
    #[must_use]
    pub fn exiting_after(mut self, signal: Signal, checks: u32) -> Self {
        self.exits_on = Some(signal);
        self.lingers_for = checks;
        self
    }

    /// Every delivery fails with `PermissionDenied`.
    #[must_use]
    pub fn denying(mut self) -> Self {
        self.deny = true;
        self
    }

    pub fn delivered(&self) -> Vec<(u32, Signal)> {
        lock(&self.delivered).clone()
    }
}

impl ProcessSignalPort for FakeSignals {
    fn is_alive(&self, pid: u32) -> bool {
        let mut lingering = lock(&self.lingering);
        if let Some(left) = lingering.get_mut(&pid) {
            if *left == 0 {
                lingering.remove(&pid);
                lock(&self.alive).remove(&pid);
            } else {
                *left -= 1;
            }
        }
        drop(lingering);
        lock(&self.alive).contains(&pid)
    }

    fn signal(&self, pid: u32, signal: Signal) -> Result<(), ProcessError> {
        if self.deny {
            return Err(ProcessError::PermissionDenied(pid));
        }
        if !self.is_alive(pid) {
            return Err(ProcessError::NoSuchProcess(pid));
        }
        lock(&self.delivered).push((pid, signal));
        if self.exits_on == Some(signal) {
            if self.lingers_for == 0 {
                lock(&self.alive).remove(&pid);
            } else {
                lock(&self.lingering).insert(pid, self.lingers_for);
            }
        }
        Ok(())
    }
}

/// Observer that keeps every event.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<SupervisorEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SupervisorEvent> {
        lock(&self.events).clone()
    }

    /// Event names in emission order.
    pub fn names(&self) -> Vec<&'static str> {
        lock(&self.events).iter().map(SupervisorEvent::name).collect()
    }
}

impl SupervisorObserver for RecordingObserver {
    fn on_event(&self, event: &SupervisorEvent) {
        lock(&self.events).push(event.clone());
    }
}
