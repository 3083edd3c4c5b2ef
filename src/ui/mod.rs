//! Terminal output
//!
//! Uses `cliclack` for framed output and prompts on a terminal, and falls
//! back to plain `[OK]`/`[WARN]` lines in CI or when output is piped.
//!
//! # Example
//!
//! ```rust,ignore
//! use offcache::ui::{self, UiContext, TaskSpinner};
//!
//! let ctx = UiContext::detect().with_auto_yes(args.yes);
//!
//! let mut spinner = TaskSpinner::new(&ctx);
//! spinner.start("Installing assistant-1.0.0-1700000000000...");
//! spinner.stop("Installed 8 assets");
//!
//! ui::step_warn_hint(&ctx, "Verification failed", "stale partitions were kept");
//!
//! if ui::confirm(&ctx, "Delete every cache partition?", false).await? {
//!     // ...
//! }
//! ```

mod context;
mod output;
mod progress;
mod prompts;

pub use context::UiContext;
pub use output::{
    intro, key_value, key_value_status, outro_success, outro_warn, remark, section,
    step_error_detail, step_info, step_ok, step_ok_detail, step_warn, step_warn_hint,
};
pub use progress::{TaskSpinner, TransferProgress};
pub use prompts::confirm;
