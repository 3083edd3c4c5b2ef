//! Error types for offcache
//!
//! All modules use `OffcacheResult<T>` as their return type. Store and
//! network failures have their own error types so the router can treat
//! them as recoverable without going through this enum.

use crate::http::FetchError;
use crate::store::StoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for offcache operations
pub type OffcacheResult<T> = Result<T, OffcacheError>;

/// All errors that can occur in offcache
#[derive(Error, Debug)]
pub enum OffcacheError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid version '{value}': {source}")]
    InvalidVersion {
        value: String,
        #[source]
        source: semver::Error,
    },

    #[error("Mirror host must differ from upstream host: {0}")]
    MirrorLoop(String),

    // Manifest errors
    #[error("Invalid precache manifest {path}: {reason}")]
    ManifestInvalid { path: PathBuf, reason: String },

    #[error("Build output not found: {0}. Did you run the build?")]
    BuildOutputMissing(PathBuf),

    // Lifecycle errors
    #[error("Precache of {partition} failed at {asset}: {reason}")]
    InstallFailed {
        partition: String,
        asset: String,
        reason: String,
    },

    #[error("Partition {partition} is incomplete: {missing} manifest asset(s) missing")]
    Incomplete { partition: String, missing: usize },

    #[error("No installed app shell found for {0}")]
    NoInstalledGeneration(String),

    #[error("Worker is redundant and no longer handles events")]
    WorkerRedundant,

    #[error("Unknown control message: {0}")]
    UnknownMessage(String),

    // Cache store and network errors
    #[error("Cache store error: {0}")]
    Store(#[from] StoreError),

    #[error("Network error: {0}")]
    Fetch(#[from] FetchError),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl OffcacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create an invalid URL error
    pub fn invalid_url(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Check if error is retryable
    ///
    /// A failed install is retried by the host on the next page load, so it
    /// counts as transient together with plain network failures.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::InstallFailed { .. } | Self::Fetch(_) | Self::Incomplete { .. }
        ) || matches!(self, Self::Store(e) if e.is_quota())
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::BuildOutputMissing(_) => Some("Build the app first so dist/assets exists"),
            Self::InstallFailed { .. } => Some("The previous app shell is untouched. Retry: offcache install"),
            Self::Incomplete { .. } => Some("Re-run: offcache install, then offcache activate"),
            Self::NoInstalledGeneration(_) => Some("Run: offcache install"),
            Self::MirrorLoop(_) => Some("Set mirror.mirror to a host other than mirror.upstream"),
            Self::Store(e) if e.is_quota() => Some("Raise storage.quota_mb or run: offcache report"),
            _ => None,
        }
    }
}
