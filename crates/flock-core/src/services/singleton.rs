//! "Is a master already running?"

use tracing::{debug, warn};

use crate::ports::{PidMarkerPort, ProcessSignalPort};

/// Pid of the live master named by the marker, if any.
///
/// A marker naming a dead process is stale and treated as absent. A marker
/// that cannot be read is treated as absent too, so a broken pid file never
/// blocks `start`.
pub fn running_master(
    marker: &dyn PidMarkerPort,
    signals: &dyn ProcessSignalPort,
) -> Option<u32> {
    match marker.read() {
        Ok(Some(pid)) if signals.is_alive(pid) => Some(pid),
        Ok(Some(pid)) => {
            debug!(pid, path = %marker.location(), "Stale pid marker");
            None
        }
        Ok(None) => None,
        Err(e) => {
            warn!(path = %marker.location(), error = %e, "Could not read pid marker");
            None
        }
    }
}
