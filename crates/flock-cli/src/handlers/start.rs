//! Start command handler.
//!
//! Becomes the master in the foreground unless one is already running.

use std::sync::Arc;

use flock_core::{ControlAction, ControlOutcome, SupervisorObserver};
use flock_runtime::{LogObserver, run_master};

use crate::bootstrap::CliContext;
use crate::error::CliError;

/// Execute the start command.
pub async fn execute(ctx: &CliContext) -> Result<i32, CliError> {
    match ctx.control().execute(ControlAction::Start).await? {
        ControlOutcome::LaunchMaster => launch(ctx).await,
        other => Err(CliError::Core(format!("unexpected outcome {other:?}"))),
    }
}

/// Run a master until it is told to exit. Shared with `restart`.
pub async fn launch(ctx: &CliContext) -> Result<i32, CliError> {
    let observers: Vec<Arc<dyn SupervisorObserver>> = vec![Arc::new(LogObserver::new())];
    Ok(run_master(ctx.settings().clone(), observers).await?)
}
