//! Observer trait for supervisor notifications.
//!
//! Implementations handle transport details (logging, channels, metrics).

use crate::events::SupervisorEvent;

/// Receives every [`SupervisorEvent`] the supervisor emits.
///
/// The runtime provides a log writer and a broadcast channel.
pub trait SupervisorObserver: Send + Sync {
    /// Handle one event. Must not block: the supervisor calls this inline
    /// from its event handlers.
    fn on_event(&self, event: &SupervisorEvent);
}
