//! Fan-out of supervisor events to async subscribers.

use flock_core::{SupervisorEvent, SupervisorObserver};
use tokio::sync::broadcast;
use tracing::debug;

/// Broadcast channel capacity for supervisor events
const CHANNEL_CAPACITY: usize = 64;

/// Forwards every event to any number of `broadcast` receivers.
///
/// Slow receivers lag and miss events rather than blocking the master.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<SupervisorEvent>,
}

impl EventBroadcaster {
    /// Create a new broadcaster
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Subscribe to supervisor events
    pub fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl SupervisorObserver for EventBroadcaster {
    fn on_event(&self, event: &SupervisorEvent) {
        // Only send if there are receivers
        if self.sender.receiver_count() > 0 {
            debug!(event = event.name(), "Broadcasting supervisor event");
            let _ = self.sender.send(event.clone());
        }
    }
}
