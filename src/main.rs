//! Offcache - offline-first asset and model cache
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use offcache::cli::{commands, Cli, Commands};
use offcache::config::ConfigManager;
use offcache::error::OffcacheResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> OffcacheResult<()> {
    let cli = Cli::parse();

    let manager = ConfigManager::from_override(cli.config.clone());
    let config = manager.load().await?;

    // 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("offcache=warn"),
        1 => EnvFilter::new("offcache=info"),
        _ => EnvFilter::new("offcache=debug"),
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if config.general.log_format == "json" {
        subscriber.json().init();
    } else {
        subscriber.without_time().init();
    }
    debug!("Using config {}", manager.path().display());

    ConfigManager::ensure_state_dirs().await?;

    match cli.command {
        Commands::Manifest(args) => commands::manifest(args, &config).await,
        Commands::Install(args) => commands::install(args, &config).await,
        Commands::Verify(args) => commands::verify(args, &config).await,
        Commands::Activate(args) => commands::activate(args, &config).await,
        Commands::Fetch(args) => commands::fetch(args, &config).await,
        Commands::Message(args) => commands::message(args, &config).await,
        Commands::List(args) => commands::list(args, &config).await,
        Commands::Report(args) => commands::report(args, &config).await,
        Commands::Import(args) => commands::import(args, &config).await,
        Commands::Config(args) => commands::config(args, &config, &manager).await,
    }
}
