//! Turns every supervisor event into a log line.

use flock_core::{ExitDisposition, SupervisorEvent, SupervisorObserver};
use tracing::{debug, error, info, warn};

/// Logs events under the `flock::events` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl LogObserver {
    pub const fn new() -> Self {
        Self
    }
}

impl SupervisorObserver for LogObserver {
    fn on_event(&self, event: &SupervisorEvent) {
        let name = event.name();
        match event {
            SupervisorEvent::Fault { message } => {
                error!(target: "flock::events", event = name, %message, "fault");
            }
            SupervisorEvent::WorkerExited {
                id,
                code,
                signal,
                disposition,
            } => {
                if *disposition == ExitDisposition::CleanExit {
                    info!(target: "flock::events", event = name, worker = %id, "worker exited");
                } else {
                    warn!(
                        target: "flock::events",
                        event = name,
                        worker = %id,
                        code = ?code,
                        signal = ?signal,
                        ?disposition,
                        "worker exited abnormally"
                    );
                }
            }
            SupervisorEvent::Started { .. }
            | SupervisorEvent::Reloading { .. }
            | SupervisorEvent::Stopping { .. }
            | SupervisorEvent::MasterExited { .. } => {
                info!(target: "flock::events", event = name, ?event);
            }
            _ => debug!(target: "flock::events", event = name, ?event),
        }
    }
}
