//! Restart command handler.

use flock_core::{ControlAction, ControlOutcome};

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::handlers::start;

/// Execute the restart command.
///
/// Stops the running master, waits for it to exit, then becomes the new
/// master. Nothing is started when the old master does not go away.
pub async fn execute(ctx: &CliContext) -> Result<i32, CliError> {
    match ctx.control().execute(ControlAction::Restart).await? {
        ControlOutcome::LaunchMaster => start::launch(ctx).await,
        other => Err(CliError::Core(format!("unexpected outcome {other:?}"))),
    }
}
