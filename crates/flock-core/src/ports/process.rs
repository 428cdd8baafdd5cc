//! Process spawning and per-process control.
//!
//! Exit observation is not part of these traits: the runtime reports
//! forks, messages, disconnects and exits back to the supervisor as discrete
//! events, so the supervisor never blocks on a child.

use crate::ports::ProcessError;
use crate::protocol::ControlMessage;
use crate::signal::Signal;
use crate::worker::WorkerId;

/// Starts worker processes.
pub trait ProcessSpawner: Send {
    /// Spawn one worker that will be known to the master as `id`.
    fn spawn(&mut self, id: WorkerId) -> Result<Box<dyn ProcessHandle>, ProcessError>;
}

/// Handle to one spawned worker process.
///
/// The owning [`WorkerRecord`](crate::worker::WorkerRecord) is the only holder.
pub trait ProcessHandle: Send {
    /// OS process id, if the platform exposes one.
    fn pid(&self) -> Option<u32>;

    /// Queue a protocol message on the worker's message channel.
    fn send(&self, message: &ControlMessage) -> Result<(), ProcessError>;

    /// Deliver a signal to the worker process.
    fn signal(&self, signal: Signal) -> Result<(), ProcessError>;
}
