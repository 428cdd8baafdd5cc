//! Liveness checks and signal delivery by pid.

use crate::ports::ProcessError;
use crate::signal::Signal;

/// Talks to arbitrary processes by pid (used to reach a running master).
pub trait ProcessSignalPort: Send + Sync {
    /// Whether a process with this pid exists (null-signal probe).
    fn is_alive(&self, pid: u32) -> bool;

    /// Deliver `signal` to `pid`.
    fn signal(&self, pid: u32, signal: Signal) -> Result<(), ProcessError>;
}
