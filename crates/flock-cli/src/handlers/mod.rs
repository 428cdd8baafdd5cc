//! Command handlers.
//!
//! Handlers follow the canonical pattern:
//! - Signature: `pub async fn execute(ctx: &CliContext) -> Result<i32, CliError>`
//! - Thin wrappers that:
//!   1. Ask the `ControlService` what to do
//!   2. Run a master when told to
//!   3. Print one line for the terminal
//!
//! The returned value is the process exit code.

pub mod help;
pub mod reload;
pub mod restart;
pub mod start;
pub mod status;
pub mod stop;

use flock_core::ControlAction;

use crate::bootstrap::CliContext;
use crate::error::CliError;

/// Route an action to its handler.
pub async fn dispatch(ctx: &CliContext, action: ControlAction) -> Result<i32, CliError> {
    match action {
        ControlAction::Start => start::execute(ctx).await,
        ControlAction::Stop => stop::execute(ctx).await,
        ControlAction::Restart => restart::execute(ctx).await,
        ControlAction::Reload => reload::execute(ctx).await,
        ControlAction::Status => status::execute(ctx).await,
        ControlAction::Help => help::execute(ctx).await,
    }
}
