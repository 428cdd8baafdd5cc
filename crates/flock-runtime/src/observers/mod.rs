//! Ready-made [`SupervisorObserver`](flock_core::SupervisorObserver)s.

mod broadcaster;
mod log;

pub use broadcaster::EventBroadcaster;
pub use log::LogObserver;
