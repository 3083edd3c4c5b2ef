//! Activate command - hand over to a build

use crate::activate::ActivationReport;
use crate::audit::{AuditLog, LifecycleEvent};
use crate::cli::args::BuildArgs;
use crate::config::Config;
use crate::error::OffcacheResult;
use crate::host;
use crate::ui::{self, UiContext};

/// Execute the activate command
pub async fn execute(args: BuildArgs, config: &Config) -> OffcacheResult<()> {
    let (worker, _clients) = host::load_worker(config, &args.manifest).await?;
    let report = worker.activate().await?;
    print_activation(&UiContext::detect(), &report);

    let event = if report.cleaned_up() {
        LifecycleEvent::Activated
    } else {
        LifecycleEvent::CleanupSkipped
    };
    AuditLog::new(config).record(event, &report).await;

    Ok(())
}

/// Summarize an activation
pub(crate) fn print_activation(ctx: &UiContext, report: &ActivationReport) {
    let partition = &report.verification.partition;

    if !report.cleaned_up() {
        ui::step_warn_hint(
            ctx,
            &format!(
                "{} is missing {} asset(s), old partitions kept",
                partition,
                report.verification.missing.len()
            ),
            "Run: offcache install",
        );
        for asset in &report.verification.missing {
            ui::remark(ctx, &format!("missing {}", asset));
        }
    }

    for name in &report.deleted {
        ui::step_info(ctx, &format!("Removed {}", name));
    }

    ui::outro_success(ctx, &format!("{} is active", partition));
}
