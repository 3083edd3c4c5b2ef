//! Import command - load local model files into the model cache

use crate::audit::{AuditLog, LifecycleEvent};
use crate::cli::args::ImportArgs;
use crate::config::Config;
use crate::error::OffcacheResult;
use crate::host;
use crate::import::{collect_files, ModelImporter};
use crate::normalize::UrlNormalizer;
use crate::report::format_bytes;
use crate::ui::{self, TransferProgress, UiContext};

/// Execute the import command
pub async fn execute(args: ImportArgs, config: &Config) -> OffcacheResult<()> {
    let ctx = UiContext::detect();
    let model_id = args
        .model
        .clone()
        .unwrap_or_else(|| args.kind.model(&config.models).id.clone());

    let importer = ModelImporter::new(
        host::open_store(config).await?,
        UrlNormalizer::from_config(&config.mirror)?,
        &config.mirror.upstream,
        &config.partitions.model_weights,
    )?;

    let files = collect_files(&args.path).await?;
    let mut progress = TransferProgress::new(&ctx, &format!("{} {}", args.kind, model_id), files.len());

    let mut bytes = 0;
    for (name, path) in &files {
        match importer.import_file(args.kind, &model_id, name, path).await {
            Ok(imported) => {
                bytes += imported.bytes;
                progress.advance(name, imported.bytes);
            }
            Err(e) => {
                progress.abandon();
                return Err(e);
            }
        }
    }
    progress.finish();

    AuditLog::new(config)
        .record(
            LifecycleEvent::ModelImported,
            &serde_json::json!({
                "kind": args.kind,
                "model": model_id,
                "files": files.len(),
                "bytes": bytes,
            }),
        )
        .await;

    ui::step_ok_detail(
        &ctx,
        &format!("Imported {} file(s) for {}", files.len(), model_id),
        &format_bytes(bytes),
    );
    Ok(())
}
