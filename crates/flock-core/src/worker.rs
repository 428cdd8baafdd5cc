//! Per-worker identity and state held by the master.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ports::ProcessHandle;
use crate::state::WorkerState;

/// Opaque worker identity, unique for the lifetime of one master.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(u64);

impl WorkerId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for WorkerId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// A worker as tracked by the supervisor.
///
/// Created at fork time and dropped exactly once, when the process exit has
/// been confirmed. Dropping the record drops the process handle with it.
pub struct WorkerRecord {
    id: WorkerId,
    handle: Box<dyn ProcessHandle>,
    state: WorkerState,
    planned_exit: bool,
    address: Option<String>,
    forked_at: DateTime<Utc>,
}

impl WorkerRecord {
    pub(crate) fn new(id: WorkerId, handle: Box<dyn ProcessHandle>) -> Self {
        Self {
            id,
            handle,
            state: WorkerState::Init,
            planned_exit: false,
            address: None,
            forked_at: Utc::now(),
        }
    }

    pub const fn id(&self) -> WorkerId {
        self.id
    }

    pub fn pid(&self) -> Option<u32> {
        self.handle.pid()
    }

    pub const fn state(&self) -> WorkerState {
        self.state
    }

    /// True once the master has asked this worker to shut down.
    pub const fn planned_exit(&self) -> bool {
        self.planned_exit
    }

    /// Last address the worker reported listening on.
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub const fn forked_at(&self) -> DateTime<Utc> {
        self.forked_at
    }

    pub fn handle(&self) -> &dyn ProcessHandle {
        self.handle.as_ref()
    }

    /// Move to `next` if the transition is legal. Returns whether it moved.
    pub(crate) fn advance(&mut self, next: WorkerState) -> bool {
        if self.state.can_transition_to(next) {
            self.state = next;
            true
        } else {
            false
        }
    }

    pub(crate) fn mark_closing(&mut self) -> bool {
        self.planned_exit = true;
        self.advance(WorkerState::Closing)
    }

    pub(crate) fn set_address(&mut self, address: String) {
        self.address = Some(address);
    }

    /// Serializable view of this record.
    pub fn summary(&self) -> WorkerSummary {
        WorkerSummary {
            id: self.id,
            pid: self.pid(),
            state: self.state,
            planned_exit: self.planned_exit,
            address: self.address.clone(),
            forked_at: self.forked_at,
        }
    }
}

impl fmt::Debug for WorkerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerRecord")
            .field("id", &self.id)
            .field("pid", &self.pid())
            .field("state", &self.state)
            .field("planned_exit", &self.planned_exit)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Snapshot of one worker, detached from its process handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerSummary {
    pub id: WorkerId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub state: WorkerState,
    pub planned_exit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub forked_at: DateTime<Utc>,
}
