//! Supervisor error taxonomy.
//!
//! Every variant is resolved at the boundary where it occurs (a control
//! command or an event handler). None of them is allowed to take the master
//! down; adapters map them to exit codes and one-line messages.

use thiserror::Error;

use crate::ports::ProcessError;
use crate::settings::SettingsError;
use crate::signal::Signal;
use crate::state::MasterState;

/// Core error type for supervisor and control operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SupervisorError {
    /// `start` found a live master behind the pid marker.
    #[error("master already running (pid {pid})")]
    AlreadyRunning { pid: u32 },

    /// `stop` / `reload` found no live master.
    #[error("master not running")]
    NotRunning,

    /// The OS refused to deliver a signal.
    #[error("failed to send {signal} to pid {pid}: {reason}")]
    SignalDelivery {
        pid: u32,
        signal: Signal,
        reason: String,
    },

    /// The old master did not exit within the restart poll budget.
    #[error("master (pid {pid}) still alive after {attempts} checks, restart aborted")]
    RestartTimeout { pid: u32, attempts: u32 },

    /// Reading or writing the pid marker failed.
    #[error("pid file error: {0}")]
    PidFileIo(String),

    /// An uncaught fault in a handler, reported rather than crashing.
    #[error("fault: {0}")]
    Fault(String),

    /// Spawning or messaging a worker failed.
    #[error(transparent)]
    Spawn(#[from] ProcessError),

    /// The master state machine was asked to move backwards.
    #[error("invalid master transition {from} -> {to}")]
    InvalidTransition { from: MasterState, to: MasterState },

    /// Settings failed validation.
    #[error(transparent)]
    Settings(#[from] SettingsError),
}
