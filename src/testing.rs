//! Scripted network and failing storage for unit tests

use crate::http::{FetchError, Fetcher, Request, Response};
use crate::store::{
    CacheKey, CacheStore, Entry, MatchOptions, MemoryStore, PartitionHandle, StoreError,
    StoreResult,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use url::Url;

#[derive(Debug, Clone)]
enum Script {
    Respond(Response),
    Fail,
}

/// Fetcher that answers from a fixed table and records every call
///
/// URLs without a script fail with a transport error.
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, response: Response) -> &Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), Script::Respond(response));
        self
    }

    pub fn ok(&self, url: &str, body: &str) -> &Self {
        self.respond(url, Response::ok(body.as_bytes().to_vec()))
    }

    pub fn fail(&self, url: &str) -> &Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), Script::Fail);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        let url = request.url().to_string();
        self.calls.lock().unwrap().push(url.clone());
        let script = self.scripts.lock().unwrap().get(&url).cloned();
        match script {
            Some(Script::Respond(response)) => Ok(response),
            Some(Script::Fail) | None => Err(FetchError::Transport {
                url,
                reason: "connection refused".to_string(),
            }),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Memory store whose reads, listing or partition deletes can be made to fail
#[derive(Debug, Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    fail_reads: AtomicBool,
    fail_list: AtomicBool,
    fail_delete: Mutex<HashSet<String>>,
}

impl FaultyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    /// Fail `has_partition` and `lookup`
    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    pub fn fail_list(&self) {
        self.fail_list.store(true, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, name: &str) {
        self.fail_delete.lock().unwrap().insert(name.to_string());
    }

    fn check(flag: &AtomicBool, what: &str) -> StoreResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::io(what, io::Error::other("disk unavailable")));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStore for FaultyStore {
    async fn open(&self, name: &str) -> StoreResult<PartitionHandle> {
        self.inner.open(name).await
    }

    async fn has_partition(&self, name: &str) -> StoreResult<bool> {
        Self::check(&self.fail_reads, "Failed to stat partition")?;
        self.inner.has_partition(name).await
    }

    async fn lookup(
        &self,
        partition: &PartitionHandle,
        url: &Url,
        options: MatchOptions,
    ) -> StoreResult<Option<Entry>> {
        Self::check(&self.fail_reads, "Failed to read entry")?;
        self.inner.lookup(partition, url, options).await
    }

    async fn put(
        &self,
        partition: &PartitionHandle,
        key: CacheKey,
        response: Response,
    ) -> StoreResult<()> {
        self.inner.put(partition, key, response).await
    }

    async fn delete_entry(&self, partition: &PartitionHandle, key: &CacheKey) -> StoreResult<bool> {
        self.inner.delete_entry(partition, key).await
    }

    async fn keys(&self, partition: &PartitionHandle) -> StoreResult<Vec<CacheKey>> {
        self.inner.keys(partition).await
    }

    async fn entry_size(
        &self,
        partition: &PartitionHandle,
        key: &CacheKey,
    ) -> StoreResult<Option<u64>> {
        self.inner.entry_size(partition, key).await
    }

    async fn list_partitions(&self) -> StoreResult<Vec<String>> {
        Self::check(&self.fail_list, "Failed to list partitions")?;
        self.inner.list_partitions().await
    }

    async fn delete_partition(&self, name: &str) -> StoreResult<bool> {
        if self.fail_delete.lock().unwrap().contains(name) {
            return Err(StoreError::io(
                format!("Failed to remove {}", name),
                io::Error::new(io::ErrorKind::PermissionDenied, "read-only"),
            ));
        }
        self.inner.delete_partition(name).await
    }
}
