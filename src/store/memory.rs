//! In-memory cache store
//!
//! Used by tests and by embedders that manage persistence themselves.
//! Supports an optional byte quota and injected write failures so the
//! router's cleanup paths can be exercised.

use super::{
    CacheKey, CacheStore, Entry, MatchOptions, PartitionHandle, StoreError, StoreResult,
};
use crate::http::Response;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::RwLock;
use url::Url;

#[derive(Debug, Default)]
struct MemPartition {
    name: String,
    entries: Vec<Entry>,
}

impl MemPartition {
    fn find(&self, url: &Url, options: MatchOptions) -> Option<&Entry> {
        let exact = CacheKey::from_url(url);
        self.entries
            .iter()
            .find(|e| e.key == exact)
            .or_else(|| {
                if options.ignore_search {
                    self.entries.iter().find(|e| e.key.matches(url, options))
                } else {
                    None
                }
            })
    }

    fn upsert(&mut self, entry: Entry) {
        match self.entries.iter_mut().find(|e| e.key == entry.key) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    fn bytes(&self) -> u64 {
        self.entries.iter().map(Entry::size).sum()
    }
}

/// How an injected write failure behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutFault {
    /// Fail before anything is written
    Reject,
    /// Leave a truncated entry behind, then fail
    Truncate,
}

/// Cache store held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    partitions: RwLock<Vec<MemPartition>>,
    quota_bytes: Option<u64>,
    faults: Mutex<HashMap<String, PutFault>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that refuses writes beyond `bytes` in total
    pub fn with_quota(bytes: u64) -> Self {
        Self {
            quota_bytes: Some(bytes),
            ..Self::default()
        }
    }

    /// Make every future `put` of `key` fail
    pub fn inject_put_fault(&self, key: &str, fault: PutFault) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.insert(key.to_string(), fault);
        }
    }

    fn fault_for(&self, key: &CacheKey) -> Option<PutFault> {
        self.faults
            .lock()
            .ok()
            .and_then(|faults| faults.get(key.as_str()).copied())
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn open(&self, name: &str) -> StoreResult<PartitionHandle> {
        let mut partitions = self.partitions.write().await;
        if !partitions.iter().any(|p| p.name == name) {
            partitions.push(MemPartition {
                name: name.to_string(),
                entries: Vec::new(),
            });
        }
        Ok(PartitionHandle::new(name))
    }

    async fn has_partition(&self, name: &str) -> StoreResult<bool> {
        Ok(self.partitions.read().await.iter().any(|p| p.name == name))
    }

    async fn lookup(
        &self,
        partition: &PartitionHandle,
        url: &Url,
        options: MatchOptions,
    ) -> StoreResult<Option<Entry>> {
        let partitions = self.partitions.read().await;
        Ok(partitions
            .iter()
            .find(|p| p.name == partition.name())
            .and_then(|p| p.find(url, options))
            .cloned())
    }

    async fn put(
        &self,
        partition: &PartitionHandle,
        key: CacheKey,
        response: Response,
    ) -> StoreResult<()> {
        let mut partitions = self.partitions.write().await;

        let used: u64 = partitions.iter().map(MemPartition::bytes).sum();

        let target = partitions
            .iter_mut()
            .find(|p| p.name == partition.name())
            .ok_or_else(|| StoreError::PartitionMissing(partition.name().to_string()))?;

        match self.fault_for(&key) {
            Some(PutFault::Reject) => {
                return Err(StoreError::WriteFailed {
                    key: key.to_string(),
                    reason: "injected failure".to_string(),
                });
            }
            Some(PutFault::Truncate) => {
                let mut partial = response;
                partial.body.truncate(partial.body.len() / 2);
                target.upsert(Entry::new(key.clone(), partial));
                return Err(StoreError::WriteFailed {
                    key: key.to_string(),
                    reason: "injected failure after partial write".to_string(),
                });
            }
            None => {}
        }

        if let Some(quota) = self.quota_bytes {
            let replaced = target
                .entries
                .iter()
                .find(|e| e.key == key)
                .map_or(0, Entry::size);
            let needed = response.body_len();
            let available = quota.saturating_sub(used - replaced);
            if needed > available {
                return Err(StoreError::QuotaExceeded { needed, available });
            }
        }

        target.upsert(Entry::new(key, response));
        Ok(())
    }

    async fn delete_entry(&self, partition: &PartitionHandle, key: &CacheKey) -> StoreResult<bool> {
        let mut partitions = self.partitions.write().await;
        let Some(target) = partitions.iter_mut().find(|p| p.name == partition.name()) else {
            return Ok(false);
        };
        let before = target.entries.len();
        target.entries.retain(|e| &e.key != key);
        Ok(target.entries.len() != before)
    }

    async fn keys(&self, partition: &PartitionHandle) -> StoreResult<Vec<CacheKey>> {
        let partitions = self.partitions.read().await;
        Ok(partitions
            .iter()
            .find(|p| p.name == partition.name())
            .map(|p| p.entries.iter().map(|e| e.key.clone()).collect())
            .unwrap_or_default())
    }

    async fn entry_size(
        &self,
        partition: &PartitionHandle,
        key: &CacheKey,
    ) -> StoreResult<Option<u64>> {
        let partitions = self.partitions.read().await;
        Ok(partitions
            .iter()
            .find(|p| p.name == partition.name())
            .and_then(|p| p.entries.iter().find(|e| &e.key == key))
            .map(Entry::size))
    }

    async fn list_partitions(&self) -> StoreResult<Vec<String>> {
        Ok(self
            .partitions
            .read()
            .await
            .iter()
            .map(|p| p.name.clone())
            .collect())
    }

    async fn delete_partition(&self, name: &str) -> StoreResult<bool> {
        let mut partitions = self.partitions.write().await;
        let before = partitions.len();
        partitions.retain(|p| p.name != name);
        Ok(partitions.len() != before)
    }
}
