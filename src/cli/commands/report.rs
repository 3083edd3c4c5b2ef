//! Report command - storage usage and model cache status

use crate::cli::args::{OutputFormat, ReportArgs};
use crate::config::Config;
use crate::error::OffcacheResult;
use crate::generation::PartitionLayout;
use crate::host;
use crate::import::{ModelImporter, ModelStatus};
use crate::normalize::UrlNormalizer;
use crate::report::{self, format_bytes, QuotaStatus, UsageReport};
use crate::ui::{self, UiContext};
use serde::Serialize;

#[derive(Serialize)]
struct FullReport<'a> {
    usage: &'a UsageReport,
    models: &'a [ModelStatus],
}

/// Execute the report command
pub async fn execute(args: ReportArgs, config: &Config) -> OffcacheResult<()> {
    let store = host::open_store(config).await?;
    let layout = PartitionLayout::from_config(config);
    let usage = report::collect(store.as_ref(), &layout, config.storage.quota_bytes()).await?;

    let importer = ModelImporter::new(
        store,
        UrlNormalizer::from_config(&config.mirror)?,
        &config.mirror.upstream,
        &config.partitions.model_weights,
    )?;
    let models = importer.status(&config.models).await?;

    match args.format {
        OutputFormat::Json => {
            let full = FullReport {
                usage: &usage,
                models: &models,
            };
            println!("{}", serde_json::to_string_pretty(&full)?);
        }
        OutputFormat::Plain => {
            for partition in &usage.partitions {
                println!("{}\t{}", partition.name, partition.bytes);
            }
        }
        OutputFormat::Table => print_report(&usage, &models, args.top),
    }

    Ok(())
}

fn print_report(usage: &UsageReport, models: &[ModelStatus], top: usize) {
    let ctx = UiContext::detect();
    ui::intro(&ctx, "Cache storage");

    if usage.partitions.is_empty() {
        ui::step_info(&ctx, "No cache partitions");
    }

    for partition in &usage.partitions {
        ui::section(
            &ctx,
            &format!(
                "{} ({}, {} entries, {})",
                partition.name,
                partition.kind,
                partition.files.len(),
                format_bytes(partition.bytes)
            ),
        );
        for file in partition.files.iter().take(top) {
            ui::key_value(&ctx, &format_bytes(file.bytes), &file.key);
        }
        if partition.files.len() > top && top > 0 {
            ui::remark(&ctx, &format!("... {} more", partition.files.len() - top));
        }
    }

    ui::section(&ctx, "Models");
    for model in models {
        let value = if model.cached {
            format!("{} ({} files)", model.id, model.files)
        } else {
            format!("{} (not cached)", model.id)
        };
        ui::key_value_status(&ctx, &model.kind.to_string(), &value, model.cached);
    }

    let total = match usage.quota_bytes {
        Some(quota) => format!(
            "{} of {} ({:.0}%)",
            format_bytes(usage.total_bytes),
            format_bytes(quota),
            QuotaStatus::percentage(usage.total_bytes, usage.quota_bytes)
        ),
        None => format_bytes(usage.total_bytes),
    };
    match usage.status {
        QuotaStatus::Ok => ui::outro_success(&ctx, &format!("Total {}", total)),
        QuotaStatus::Warning => ui::outro_warn(&ctx, &format!("Total {}, nearing quota", total)),
        QuotaStatus::Exceeded => ui::outro_warn(
            &ctx,
            &format!("Total {}, quota reached: new entries will not be cached", total),
        ),
    }
}
