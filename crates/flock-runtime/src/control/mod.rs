//! The master's event loop.
//!
//! [`ControlChannel`] owns the [`Supervisor`](flock_core::Supervisor) and is
//! the only place its methods are called from. OS signals arrive as
//! [`Stimulus`] values, child process events as
//! [`WorkerNotice`](crate::process::WorkerNotice)s.

mod channel;
mod master;
mod signals;

use thiserror::Error;

use flock_core::SupervisorError;

pub use channel::ControlChannel;
pub use master::run_master;
pub use signals::{SignalListener, Stimulus, bindings};

/// Why a master could not run.
#[derive(Debug, Error)]
pub enum MasterError {
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error("failed to install signal handlers: {0}")]
    Signals(#[source] std::io::Error),

    #[error("cannot resolve worker program: {0}")]
    WorkerProgram(#[source] std::io::Error),
}
