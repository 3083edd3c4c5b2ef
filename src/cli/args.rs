//! CLI argument definitions using clap derive

use crate::import::ModelKind;
use crate::messaging::ControlMessage;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Offcache - offline-first asset and model cache
///
/// Precaches an app shell, gates generation upgrades on integrity checks,
/// and serves app assets and model weights from a durable local cache.
#[derive(Parser, Debug)]
#[command(name = "offcache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "OFFCACHE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate precache.toml from a build output directory
    Manifest(ManifestArgs),

    /// Precache the app shell of a build
    Install(BuildArgs),

    /// Check that a build's app shell is completely cached
    Verify(BuildArgs),

    /// Activate a build: verify, remove stale partitions, take control
    Activate(BuildArgs),

    /// Route one request through the cache
    Fetch(FetchArgs),

    /// Send a control message to the worker
    Message(MessageArgs),

    /// List cache partitions
    List(ListArgs),

    /// Show storage usage per partition and model cache status
    Report(ReportArgs),

    /// Import local model files into the model cache
    Import(ImportArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Arguments for the manifest command
#[derive(Parser, Debug)]
pub struct ManifestArgs {
    /// Build output directory containing `assets/`
    #[arg(default_value = "dist")]
    pub dist: PathBuf,

    /// App version (defaults to app.version from config)
    #[arg(long = "app-version", value_name = "VERSION")]
    pub app_version: Option<String>,

    /// Output file (defaults to <dist>/precache.toml)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for commands that act on one build
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Path to the build's precache.toml
    #[arg(short, long, default_value = "dist/precache.toml")]
    pub manifest: PathBuf,
}

/// Arguments for the fetch command
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Absolute URL to request
    pub url: String,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Serve the app shell of this build (defaults to the newest installed)
    #[arg(short, long)]
    pub manifest: Option<PathBuf>,

    /// Write the response body to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Control message kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MessageKind {
    /// Activate the installed build immediately
    SkipWaiting,
    /// Delete every partition, including model weights
    #[value(alias = "clear-cache")]
    ClearAllCaches,
}

impl From<MessageKind> for ControlMessage {
    fn from(kind: MessageKind) -> Self {
        match kind {
            MessageKind::SkipWaiting => ControlMessage::SkipWaiting,
            MessageKind::ClearAllCaches => ControlMessage::ClearAllCaches,
        }
    }
}

/// Arguments for the message command
#[derive(Parser, Debug)]
#[command(group(clap::ArgGroup::new("message").required(true).args(["kind", "json"])))]
pub struct MessageArgs {
    /// Message to send
    pub kind: Option<MessageKind>,

    /// Raw JSON message, e.g. '{"type":"CLEAR_ALL_CACHES"}'
    #[arg(long)]
    pub json: Option<String>,

    /// Build to activate on SKIP_WAITING
    #[arg(short, long, default_value = "dist/precache.toml")]
    pub manifest: PathBuf,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments for the list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the report command
#[derive(Parser, Debug)]
pub struct ReportArgs {
    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,

    /// Largest files to show per partition (0 = none)
    #[arg(long, default_value = "5")]
    pub top: usize,
}

/// Arguments for the import command
#[derive(Parser, Debug)]
pub struct ImportArgs {
    /// Model kind
    pub kind: ModelKind,

    /// Model file or directory
    pub path: PathBuf,

    /// Repository id (defaults to the configured model for the kind)
    #[arg(long)]
    pub model: Option<String>,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., mirror.mirror)
        key: String,
        /// Value to set
        value: String,
    },
}

/// Output format for listings
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}
