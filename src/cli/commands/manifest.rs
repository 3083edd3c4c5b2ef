//! Manifest command - generate precache.toml from build output

use crate::audit::{AuditLog, LifecycleEvent};
use crate::cli::args::ManifestArgs;
use crate::config::Config;
use crate::error::OffcacheResult;
use crate::generation::Generation;
use crate::manifest::{BuildManifest, Manifest};
use crate::ui::{self, UiContext};

/// Execute the manifest command
pub async fn execute(args: ManifestArgs, config: &Config) -> OffcacheResult<()> {
    let ctx = UiContext::detect();

    let version = args.app_version.as_deref().unwrap_or(&config.app.version);
    let generation = Generation::stamp_now(&config.app.name, version)?;
    let manifest = Manifest::from_build_dir(&args.dist).await?;
    let output = args
        .output
        .unwrap_or_else(|| BuildManifest::path_in(&args.dist));

    let build = BuildManifest::new(generation, manifest);
    build.save(&output).await?;

    AuditLog::new(config)
        .record(
            LifecycleEvent::ManifestGenerated,
            &serde_json::json!({
                "partition": build.generation.partition_name(),
                "assets": build.manifest().len(),
                "path": output.display().to_string(),
            }),
        )
        .await;

    ui::step_ok_detail(
        &ctx,
        &format!("{} asset(s) in precache manifest", build.manifest().len()),
        &output.display().to_string(),
    );
    ui::key_value(&ctx, "Partition", &build.generation.partition_name());
    if let Some(built) = build.generation.built_at_utc() {
        ui::key_value(&ctx, "Built", &built.to_rfc3339());
    }

    Ok(())
}
