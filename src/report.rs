//! Storage usage per partition

use crate::error::OffcacheResult;
use crate::generation::{PartitionKind, PartitionLayout};
use crate::store::CacheStore;
use serde::Serialize;

/// Format bytes as human-readable size
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Usage relative to the configured quota
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaStatus {
    /// No quota, or under 80% of it
    Ok,
    /// Between 80% and 100%
    Warning,
    /// At or over the quota; further writes will fail
    Exceeded,
}

impl QuotaStatus {
    pub fn from_usage(used: u64, quota: Option<u64>) -> Self {
        let percent = Self::percentage(used, quota);
        if percent >= 100.0 {
            Self::Exceeded
        } else if percent >= 80.0 {
            Self::Warning
        } else {
            Self::Ok
        }
    }

    pub fn percentage(used: u64, quota: Option<u64>) -> f64 {
        match quota {
            Some(quota) if quota > 0 => (used as f64 / quota as f64) * 100.0,
            _ => 0.0,
        }
    }
}

/// One stored entry and its size
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileUsage {
    pub key: String,
    pub bytes: u64,
}

/// Usage of one partition, largest entries first
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionUsage {
    pub name: String,
    pub kind: PartitionKind,
    pub bytes: u64,
    pub files: Vec<FileUsage>,
}

/// Usage across the whole store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageReport {
    pub partitions: Vec<PartitionUsage>,
    pub total_bytes: u64,
    pub quota_bytes: Option<u64>,
    pub status: QuotaStatus,
}

impl UsageReport {
    pub fn entry_count(&self) -> usize {
        self.partitions.iter().map(|p| p.files.len()).sum()
    }
}

/// Measure every partition in the store
pub async fn collect(
    store: &dyn CacheStore,
    layout: &PartitionLayout,
    quota_bytes: Option<u64>,
) -> OffcacheResult<UsageReport> {
    let mut partitions = Vec::new();
    for name in store.list_partitions().await? {
        let handle = store.open(&name).await?;
        let mut files = Vec::new();
        for key in store.keys(&handle).await? {
            let bytes = store.entry_size(&handle, &key).await?.unwrap_or(0);
            files.push(FileUsage {
                key: key.to_string(),
                bytes,
            });
        }
        files.sort_by(|a, b| b.bytes.cmp(&a.bytes).then_with(|| a.key.cmp(&b.key)));

        partitions.push(PartitionUsage {
            kind: layout.classify(&name),
            bytes: files.iter().map(|f| f.bytes).sum(),
            name,
            files,
        });
    }

    let total_bytes = partitions.iter().map(|p| p.bytes).sum();
    Ok(UsageReport {
        partitions,
        total_bytes,
        quota_bytes,
        status: QuotaStatus::from_usage(total_bytes, quota_bytes),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Response;
    use crate::store::{CacheKey, MemoryStore};
    use url::Url;

    fn layout() -> PartitionLayout {
        PartitionLayout {
            app: "assistant".to_string(),
            runtime: "assistant-runtime".to_string(),
            model_weights: "transformers-cache".to_string(),
            preserved: Vec::new(),
        }
    }

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1024 * 1024), "1.00 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn quota_status_thresholds() {
        assert_eq!(QuotaStatus::from_usage(10_000, None), QuotaStatus::Ok);
        assert_eq!(QuotaStatus::from_usage(50, Some(100)), QuotaStatus::Ok);
        assert_eq!(QuotaStatus::from_usage(85, Some(100)), QuotaStatus::Warning);
        assert_eq!(QuotaStatus::from_usage(100, Some(100)), QuotaStatus::Exceeded);
    }

    #[tokio::test]
    async fn collect_sorts_largest_first() {
        let store = MemoryStore::new();
        let weights = store.open("transformers-cache").await.unwrap();
        for (key, body) in [
            ("https://m.example/small.json", "{}"),
            ("https://m.example/big.onnx", "0123456789"),
        ] {
            let url = Url::parse(key).unwrap();
            store
                .put(&weights, CacheKey::from_url(&url), Response::ok(body))
                .await
                .unwrap();
        }
        store.open("assistant-runtime").await.unwrap();

        let report = collect(&store, &layout(), Some(100)).await.unwrap();

        assert_eq!(report.total_bytes, 12);
        assert_eq!(report.entry_count(), 2);
        let models = &report.partitions[0];
        assert_eq!(models.kind, PartitionKind::ModelWeights);
        assert_eq!(models.files[0].key, "https://m.example/big.onnx");
        assert_eq!(report.partitions[1].bytes, 0);
        assert_eq!(report.status, QuotaStatus::Ok);
    }
}
