//! Verify command - check a build's app shell against its manifest

use crate::cli::args::BuildArgs;
use crate::config::Config;
use crate::error::{OffcacheError, OffcacheResult};
use crate::host;
use crate::ui::{self, UiContext};

/// Execute the verify command
pub async fn execute(args: BuildArgs, config: &Config) -> OffcacheResult<()> {
    let ctx = UiContext::detect();
    let (worker, _clients) = host::load_worker(config, &args.manifest).await?;
    let verification = worker.verify().await?;

    if verification.complete {
        ui::step_ok_detail(&ctx, "App shell complete", &verification.partition);
        return Ok(());
    }

    ui::step_error_detail(&ctx, "App shell incomplete", &verification.partition);
    for asset in &verification.missing {
        ui::remark(&ctx, &format!("missing {}", asset));
    }

    Err(OffcacheError::Incomplete {
        partition: verification.partition,
        missing: verification.missing.len(),
    })
}
