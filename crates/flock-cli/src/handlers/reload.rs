//! Reload command handler.

use flock_core::{ControlAction, ControlOutcome};

use crate::bootstrap::CliContext;
use crate::error::CliError;

/// Execute the reload command: the master replaces every worker.
pub async fn execute(ctx: &CliContext) -> Result<i32, CliError> {
    if let ControlOutcome::Signalled { pid, signal } =
        ctx.control().execute(ControlAction::Reload).await?
    {
        println!("Sent {signal} to master (pid {pid}), reloading workers");
    }
    Ok(0)
}
