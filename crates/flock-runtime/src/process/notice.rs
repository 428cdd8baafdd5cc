//! What the per-child helper tasks report back to the master.

use flock_core::{ControlMessage, WorkerId};

/// A worker process event, in the order the helper tasks observed it.
///
/// `Disconnected` and `Exited` come from different tasks, so either may
/// arrive first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerNotice {
    /// The process was created.
    Forked { id: WorkerId },
    /// A protocol line was read from the worker's stdout.
    Message { id: WorkerId, message: ControlMessage },
    /// The worker's stdout closed.
    Disconnected { id: WorkerId },
    /// The process was reaped.
    Exited {
        id: WorkerId,
        code: Option<i32>,
        signal: Option<i32>,
    },
}

impl WorkerNotice {
    pub const fn worker_id(&self) -> WorkerId {
        match self {
            Self::Forked { id }
            | Self::Message { id, .. }
            | Self::Disconnected { id }
            | Self::Exited { id, .. } => *id,
        }
    }
}
