//! Message command - send a control message to the worker

use super::activate::print_activation;
use crate::audit::{AuditLog, LifecycleEvent};
use crate::cli::args::MessageArgs;
use crate::config::Config;
use crate::error::{OffcacheError, OffcacheResult};
use crate::generation::PartitionLayout;
use crate::host;
use crate::messaging::{clear_all_caches, BroadcastClients, ControlMessage};
use crate::store::CacheStore;
use crate::ui::{self, UiContext};
use console::style;

/// Execute the message command
pub async fn execute(args: MessageArgs, config: &Config) -> OffcacheResult<()> {
    let ctx = UiContext::detect().with_auto_yes(args.yes);

    let message = match (args.kind, args.json.as_deref()) {
        (Some(kind), _) => ControlMessage::from(kind),
        (None, Some(json)) => ControlMessage::parse(json)?,
        (None, None) => {
            return Err(OffcacheError::User(
                "Specify a message kind or --json".to_string(),
            ))
        }
    };

    match message {
        ControlMessage::SkipWaiting => skip_waiting(&ctx, &args, config).await,
        ControlMessage::ClearAllCaches => clear(&ctx, config).await,
    }
}

/// Activate the installed build right away
async fn skip_waiting(ctx: &UiContext, args: &MessageArgs, config: &Config) -> OffcacheResult<()> {
    let (worker, clients) = host::load_worker(config, &args.manifest).await?;
    worker.handle_message(ControlMessage::SkipWaiting).await?;
    if clients.skip_waiting_requested() {
        ui::step_info(ctx, &format!("Skipping wait for {}", worker.partition()));
    }

    let report = worker.activate().await?;
    print_activation(ctx, &report);
    Ok(())
}

async fn clear(ctx: &UiContext, config: &Config) -> OffcacheResult<()> {
    let store = host::open_store(config).await?;
    let names = store.list_partitions().await?;

    if names.is_empty() {
        ui::step_info(ctx, "No partitions to clear");
        return Ok(());
    }

    let layout = PartitionLayout::from_config(config);
    println!("This will remove {} partition(s):", names.len());
    for name in &names {
        println!("  {} {} ({})", style("•").red(), name, layout.classify(name));
    }
    println!();

    if !ui::confirm(ctx, "Delete every partition, including model weights?", false).await? {
        ui::step_warn(ctx, "Aborted");
        return Ok(());
    }

    let clients = BroadcastClients::new();
    let report = clear_all_caches(store.as_ref(), &clients).await?;
    AuditLog::new(config)
        .record(LifecycleEvent::CachesCleared, &report)
        .await;

    ui::step_ok(ctx, &format!("Cleared {} partition(s)", report.deleted.len()));
    Ok(())
}
