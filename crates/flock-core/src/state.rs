//! Master and worker state machines.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of the master process. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MasterState {
    Init,
    Running,
    Closing,
}

impl MasterState {
    /// `Init → Running → Closing`, skipping allowed, no way back.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        next > self
    }
}

impl fmt::Display for MasterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Init => "init",
            Self::Running => "running",
            Self::Closing => "closing",
        })
    }
}

/// Lifecycle of a single worker as seen by the master.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Spawn requested, not yet confirmed.
    Init,
    /// Process exists.
    Created,
    /// Worker announced itself over the message channel.
    Online,
    /// Worker bound a socket.
    Listening,
    /// Master asked the worker to shut down.
    Closing,
    /// Message channel closed; waiting for exit confirmation.
    Disconnected,
}

impl WorkerState {
    /// Active workers count toward the pool size.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            Self::Init | Self::Created | Self::Online | Self::Listening
        )
    }

    /// Whether `next` is a legal successor of `self`.
    ///
    /// Startup confirmations may be skipped (a fast worker can report
    /// `Listening` before `Online` is processed) but never replayed backwards.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Init, Self::Created | Self::Online | Self::Listening)
                | (Self::Created, Self::Online | Self::Listening)
                | (Self::Online | Self::Listening, Self::Listening)
                | (
                    Self::Init | Self::Created | Self::Online | Self::Listening,
                    Self::Closing,
                )
                | (
                    Self::Init | Self::Created | Self::Online | Self::Listening | Self::Closing,
                    Self::Disconnected,
                )
        )
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Init => "init",
            Self::Created => "created",
            Self::Online => "online",
            Self::Listening => "listening",
            Self::Closing => "closing",
            Self::Disconnected => "disconnected",
        })
    }
}
