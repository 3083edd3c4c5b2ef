//! Lifecycle journal
//!
//! Appends one JSON line per install, activation, clear and import to
//! `audit.log` in the state directory, so a user can reconstruct which
//! generation was current when and why a partition disappeared.

use crate::config::{schema::Config, ConfigManager};
use chrono::Utc;
use serde::Serialize;
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// Kinds of journaled events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LifecycleEvent {
    #[serde(rename = "manifest.generated")]
    ManifestGenerated,
    #[serde(rename = "install.succeeded")]
    InstallSucceeded,
    #[serde(rename = "install.failed")]
    InstallFailed,
    #[serde(rename = "activate.completed")]
    Activated,
    #[serde(rename = "activate.cleanup_skipped")]
    CleanupSkipped,
    #[serde(rename = "caches.cleared")]
    CachesCleared,
    #[serde(rename = "model.imported")]
    ModelImported,
}

/// Append-only JSON lines journal
pub struct AuditLog {
    enabled: bool,
    path: PathBuf,
}

impl AuditLog {
    pub fn new(config: &Config) -> Self {
        Self {
            enabled: config.general.audit_log,
            path: ConfigManager::audit_log_path(),
        }
    }

    pub fn with_path(path: PathBuf, enabled: bool) -> Self {
        Self { enabled, path }
    }

    /// Record an event. IO failures are logged and the event is dropped.
    pub async fn record<T: Serialize>(&self, event: LifecycleEvent, data: &T) {
        if !self.enabled {
            return;
        }

        let entry = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event": event,
            "data": data,
        });

        let mut line = match serde_json::to_string(&entry) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to serialize journal event: {}", e);
                return;
            }
        };
        line.push('\n');

        if let Err(e) = self.append(&line).await {
            warn!("Failed to write journal {}: {}", self.path.display(), e);
        }
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn records_json_lines() {
        let dir = TempDir::new().unwrap();
        let journal = AuditLog::with_path(dir.path().join("audit.log"), true);

        journal
            .record(
                LifecycleEvent::InstallSucceeded,
                &serde_json::json!({"partition": "assistant-1.0.0-1"}),
            )
            .await;
        journal
            .record(LifecycleEvent::CachesCleared, &serde_json::json!({"deleted": 3}))
            .await;

        let content = tokio::fs::read_to_string(dir.path().join("audit.log"))
            .await
            .unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "install.succeeded");
        assert_eq!(lines[0]["data"]["partition"], "assistant-1.0.0-1");
        assert_eq!(lines[1]["event"], "caches.cleared");
        assert!(lines[1]["timestamp"].is_string());
    }

    #[tokio::test]
    async fn disabled_journal_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.log");
        let journal = AuditLog::with_path(path.clone(), false);

        journal
            .record(LifecycleEvent::ModelImported, &serde_json::json!({}))
            .await;

        assert!(!path.exists());
    }
}
