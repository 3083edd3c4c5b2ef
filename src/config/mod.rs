//! Configuration loading and state paths
//!
//! The config file lives at `<config dir>/offcache/config.toml` unless `-c` or
//! `OFFCACHE_CONFIG` points elsewhere. The store and the audit journal live
//! under the platform state directory.

pub mod schema;

pub use schema::Config;

use crate::error::{OffcacheError, OffcacheResult};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

const APP_DIR: &str = "offcache";

/// Loads and saves one config file
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self::with_path(Self::default_config_path())
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Use `path` when given, the default location otherwise
    pub fn from_override(path: Option<PathBuf>) -> Self {
        path.map(Self::with_path).unwrap_or_default()
    }

    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    /// Platform state dir (falls back to local data dir on macOS/Windows)
    pub fn state_dir() -> PathBuf {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }

    pub fn store_dir() -> PathBuf {
        Self::state_dir().join("store")
    }

    pub fn audit_log_path() -> PathBuf {
        Self::state_dir().join("audit.log")
    }

    /// `storage.root` if set, the state-dir store otherwise
    pub fn store_root(config: &Config) -> PathBuf {
        config.storage.root.clone().unwrap_or_else(Self::store_dir)
    }

    /// Load the file; a missing file yields defaults
    pub async fn load(&self) -> OffcacheResult<Config> {
        let path = &self.config_path;
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No config at {}, using defaults", path.display());
                return Ok(Config::default());
            }
            Err(e) => {
                return Err(OffcacheError::io(format!("reading {}", path.display()), e));
            }
        };

        toml::from_str(&content).map_err(|e| OffcacheError::ConfigInvalid {
            path: path.clone(),
            reason: e.to_string(),
        })
    }

    /// Write the whole config, replacing the file in one rename
    pub async fn save(&self, config: &Config) -> OffcacheResult<()> {
        let path = &self.config_path;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| OffcacheError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        let tmp = path.with_extension(format!("toml.{}.tmp", Uuid::new_v4().simple()));
        fs::write(&tmp, toml::to_string_pretty(config)?)
            .await
            .map_err(|e| OffcacheError::io(format!("writing {}", tmp.display()), e))?;
        if let Err(e) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(OffcacheError::io(format!("writing {}", path.display()), e));
        }

        info!("Saved configuration to {}", path.display());
        Ok(())
    }

    pub async fn ensure_state_dirs() -> OffcacheResult<()> {
        let dir = Self::state_dir();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| OffcacheError::io(format!("creating {}", dir.display()), e))
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
