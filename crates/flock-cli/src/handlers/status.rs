//! Status command handler.

use flock_core::{ControlAction, ControlOutcome};

use crate::bootstrap::CliContext;
use crate::error::CliError;

/// Execute the status command.
///
/// Prints the status line. Exits 0 either way, like the other commands that
/// only report.
pub async fn execute(ctx: &CliContext) -> Result<i32, CliError> {
    let pid = match ctx.control().execute(ControlAction::Status).await? {
        ControlOutcome::Status { pid } => pid,
        _ => None,
    };
    print!("{}", ctx.control().status_text(pid));
    Ok(0)
}
