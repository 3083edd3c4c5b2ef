//! Install command - precache a build's app shell

use crate::audit::{AuditLog, LifecycleEvent};
use crate::cli::args::BuildArgs;
use crate::config::Config;
use crate::error::OffcacheResult;
use crate::host;
use crate::report::format_bytes;
use crate::ui::{self, TaskSpinner, UiContext};

/// Execute the install command
pub async fn execute(args: BuildArgs, config: &Config) -> OffcacheResult<()> {
    let ctx = UiContext::detect();
    let audit = AuditLog::new(config);
    let (worker, _clients) = host::load_worker(config, &args.manifest).await?;
    let partition = worker.partition();

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Precaching {}...", partition));

    match worker.install().await {
        Ok(report) => {
            spinner.stop(&format!(
                "Cached {} asset(s), {}",
                report.assets,
                format_bytes(report.bytes)
            ));
            audit.record(LifecycleEvent::InstallSucceeded, &report).await;
            ui::remark(&ctx, "Next: offcache activate");
            Ok(())
        }
        Err(e) => {
            spinner.stop_error(&format!("Install of {} failed", partition));
            audit
                .record(
                    LifecycleEvent::InstallFailed,
                    &serde_json::json!({
                        "partition": partition,
                        "error": e.to_string(),
                    }),
                )
                .await;
            Err(e)
        }
    }
}
