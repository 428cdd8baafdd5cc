//! Help command handler.

use crate::bootstrap::CliContext;
use crate::error::CliError;

/// Print the usage line.
pub async fn execute(ctx: &CliContext) -> Result<i32, CliError> {
    print!("{}", ctx.control().usage_text());
    Ok(0)
}
