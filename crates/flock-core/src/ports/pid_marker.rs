//! Storage for the pid of the running master.

use crate::error::SupervisorError;

/// The on-disk record of the running master's pid.
///
/// There is no locking: concurrent writers race, and callers are expected to
/// check liveness of whatever pid is recorded before overwriting it.
pub trait PidMarkerPort: Send + Sync {
    /// Recorded pid. `Ok(None)` when the marker is missing or unreadable as a pid.
    fn read(&self) -> Result<Option<u32>, SupervisorError>;

    /// Record `pid` as the running master.
    fn write(&self, pid: u32) -> Result<(), SupervisorError>;

    /// Remove the marker. Removing a missing marker is not an error.
    fn remove(&self) -> Result<(), SupervisorError>;

    /// Human-readable location, for log lines.
    fn location(&self) -> String;
}
