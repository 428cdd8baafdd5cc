//! Worker processes as OS children.
//!
//! The spawner starts each worker with piped stdin/stdout and hands back a
//! [`ChildHandle`]. Three helper tasks per child forward everything that
//! happens to it as [`WorkerNotice`]s on one unbounded channel:
//!
//! - a writer that serializes [`ControlMessage`](flock_core::ControlMessage)s to stdin
//! - a reader that parses protocol lines from stdout
//! - a waiter that reports the exit status

mod child;
mod notice;
mod signal;
mod spawner;

pub use child::ChildHandle;
pub use notice::WorkerNotice;
pub use signal::{OsSignals, deliver_signal};
pub use spawner::CommandSpawner;
