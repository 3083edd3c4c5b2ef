//! Interactive prompts with non-interactive fallback

use super::context::UiContext;
use crate::error::{OffcacheError, OffcacheResult};

/// Ask for confirmation
///
/// Returns true under `--yes`, and `default` when no terminal is attached.
pub async fn confirm(ctx: &UiContext, message: &str, default: bool) -> OffcacheResult<bool> {
    if ctx.auto_yes() {
        println!("  {} (auto-approved)", message);
        return Ok(true);
    }

    if !ctx.is_interactive() {
        return Ok(default);
    }

    let message = message.to_string();
    tokio::task::spawn_blocking(move || {
        cliclack::confirm(&message)
            .initial_value(default)
            .interact()
    })
    .await
    .map_err(|e| OffcacheError::Internal(format!("Prompt task failed: {}", e)))?
    .map_err(|e| OffcacheError::User(format!("Prompt failed: {}", e)))
}
