//! Stop command handler.

use flock_core::{ControlAction, ControlOutcome};

use crate::bootstrap::CliContext;
use crate::error::CliError;

/// Execute the stop command.
///
/// Only delivers the shutdown signal; the master drains its workers on its
/// own time.
pub async fn execute(ctx: &CliContext) -> Result<i32, CliError> {
    if let ControlOutcome::Signalled { pid, signal } =
        ctx.control().execute(ControlAction::Stop).await?
    {
        println!("Sent {signal} to master (pid {pid})");
    }
    Ok(0)
}
