//! List command - show cache partitions

use crate::cli::args::{ListArgs, OutputFormat};
use crate::config::Config;
use crate::error::OffcacheResult;
use crate::generation::{Generation, PartitionKind, PartitionLayout};
use crate::host;
use crate::report::{self, format_bytes, PartitionUsage};
use crate::ui::{self, UiContext};
use console::style;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct PartitionRow {
    name: String,
    kind: PartitionKind,
    entries: usize,
    bytes: u64,
    current: bool,
}

impl PartitionRow {
    fn new(usage: &PartitionUsage, current: Option<&str>) -> Self {
        Self {
            name: usage.name.clone(),
            kind: usage.kind,
            entries: usage.files.len(),
            bytes: usage.bytes,
            current: current == Some(usage.name.as_str()),
        }
    }
}

/// Execute the list command
pub async fn execute(args: ListArgs, config: &Config) -> OffcacheResult<()> {
    let store = host::open_store(config).await?;
    let layout = PartitionLayout::from_config(config);
    let usage = report::collect(store.as_ref(), &layout, config.storage.quota_bytes()).await?;

    let names: Vec<String> = usage.partitions.iter().map(|p| p.name.clone()).collect();
    let current = Generation::latest(&layout.app, &names).map(|g| g.partition_name());
    let rows: Vec<PartitionRow> = usage
        .partitions
        .iter()
        .map(|p| PartitionRow::new(p, current.as_deref()))
        .collect();

    if rows.is_empty() {
        match args.format {
            OutputFormat::Json => println!("[]"),
            OutputFormat::Plain => {}
            OutputFormat::Table => {
                let ctx = UiContext::detect();
                ui::step_info(&ctx, "No cache partitions");
            }
        }
        return Ok(());
    }

    match args.format {
        OutputFormat::Table => print_table(&rows),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Plain => {
            for row in &rows {
                println!("{}", row.name);
            }
        }
    }

    Ok(())
}

fn print_table(rows: &[PartitionRow]) {
    println!(
        "{:<36} {:<14} {:>8} {:>12}",
        style("PARTITION").bold(),
        style("KIND").bold(),
        style("ENTRIES").bold(),
        style("SIZE").bold()
    );
    println!("{}", "-".repeat(73));

    for row in rows {
        let kind = match row.kind {
            PartitionKind::AppShell if row.current => style("app-shell*".to_string()).green(),
            PartitionKind::AppShell => style("app-shell".to_string()).dim(),
            PartitionKind::ModelWeights => style(row.kind.to_string()).cyan(),
            PartitionKind::Other => style(row.kind.to_string()).yellow(),
            _ => style(row.kind.to_string()),
        };
        println!(
            "{:<36} {:<14} {:>8} {:>12}",
            row.name,
            kind,
            row.entries,
            format_bytes(row.bytes)
        );
    }

    println!();
    println!("{} partition(s), * = current app shell", rows.len());
}
