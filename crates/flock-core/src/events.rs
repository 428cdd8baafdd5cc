//! Typed supervisor notifications.
//!
//! This is the closed vocabulary observers pattern-match on. Every state
//! change of the master or of a worker is reported through exactly one of
//! these variants.
//!
//! # Wire Format
//!
//! Events serialize with a `type` tag so they can be forwarded as JSON:
//!
//! ```json
//! { "type": "worker_exited", "id": 3, "code": 0, "disposition": "clean_exit" }
//! ```

use serde::{Deserialize, Serialize};

use crate::worker::WorkerId;

/// How a worker process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitDisposition {
    /// Terminated by a signal.
    SignalExit,
    /// Exited with a non-zero code.
    ErrorExit,
    /// Exited with code 0, normally after the shutdown handshake.
    CleanExit,
}

impl ExitDisposition {
    /// Signal wins over code; a missing code without a signal counts as an error.
    #[must_use]
    pub const fn classify(code: Option<i32>, signal: Option<i32>) -> Self {
        match (code, signal) {
            (_, Some(_)) => Self::SignalExit,
            (Some(0), None) => Self::CleanExit,
            _ => Self::ErrorExit,
        }
    }
}

/// Supervisor lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SupervisorEvent {
    /// The master finished startup and owns the pid marker.
    Started { pid: u32, target: usize },

    /// Pool target changed.
    Resized { from: usize, to: usize },

    /// A worker process was spawned.
    WorkerForked {
        id: WorkerId,
        #[serde(skip_serializing_if = "Option::is_none")]
        pid: Option<u32>,
    },

    /// A worker announced itself.
    WorkerOnline { id: WorkerId },

    /// A worker bound a socket.
    WorkerListening { id: WorkerId, address: String },

    /// A worker acknowledged a shutdown request.
    WorkerShutdownAcknowledged { id: WorkerId },

    /// A worker's message channel closed.
    WorkerDisconnected { id: WorkerId },

    /// A worker process exit was confirmed and its record removed.
    WorkerExited {
        id: WorkerId,
        code: Option<i32>,
        signal: Option<i32>,
        disposition: ExitDisposition,
    },

    /// The whole pool is being replaced.
    Reloading { target: usize },

    /// `SIGHUP` received. No state change.
    HangUp,

    /// The master is shutting down.
    Stopping { code: i32 },

    /// An uncaught fault was contained; the master keeps running.
    Fault { message: String },

    /// Final notification before the master process ends.
    MasterExited { code: i32 },
}

impl SupervisorEvent {
    /// Worker the event refers to, if any.
    #[must_use]
    pub const fn worker_id(&self) -> Option<WorkerId> {
        match self {
            Self::WorkerForked { id, .. }
            | Self::WorkerOnline { id }
            | Self::WorkerListening { id, .. }
            | Self::WorkerShutdownAcknowledged { id }
            | Self::WorkerDisconnected { id }
            | Self::WorkerExited { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// Stable snake_case name, matching the serialized `type` tag.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::Resized { .. } => "resized",
            Self::WorkerForked { .. } => "worker_forked",
            Self::WorkerOnline { .. } => "worker_online",
            Self::WorkerListening { .. } => "worker_listening",
            Self::WorkerShutdownAcknowledged { .. } => "worker_shutdown_acknowledged",
            Self::WorkerDisconnected { .. } => "worker_disconnected",
            Self::WorkerExited { .. } => "worker_exited",
            Self::Reloading { .. } => "reloading",
            Self::HangUp => "hang_up",
            Self::Stopping { .. } => "stopping",
            Self::Fault { .. } => "fault",
            Self::MasterExited { .. } => "master_exited",
        }
    }
}
