//! Durable on-disk cache store
//!
//! Layout under the store root:
//!
//! ```text
//! partitions.json            ordered list of {name, dir}
//! p-<hash(name)>/
//!   <hash(key)>.json         entry metadata, points at its body file
//!   <hash(key)>.<id>.body    response body
//! ```
//!
//! A write lands the body under a fresh file name, then renames the
//! metadata into place. Readers therefore see either the old entry or the
//! new one, never a truncated body. Writers are serialized so that an
//! overwrite always removes the body it replaced.

use super::{
    CacheKey, CacheStore, Entry, MatchOptions, PartitionHandle, StoreError, StoreResult,
};
use crate::http::{Headers, Response};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

const INDEX_FILE: &str = "partitions.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PartitionRecord {
    name: String,
    dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryMeta {
    key: CacheKey,
    status: u16,
    status_text: String,
    headers: Headers,
    stored_at: DateTime<Utc>,
    body_file: String,
    body_len: u64,
}

/// Hash a string with SHA256, returning the first `len` hex chars
fn short_hash(value: &str, len: usize) -> String {
    let digest = Sha256::digest(value.as_bytes());
    let mut encoded = hex::encode(digest);
    encoded.truncate(len);
    encoded
}

/// Cache store persisted to a directory
#[derive(Debug)]
pub struct DiskStore {
    root: PathBuf,
    quota_bytes: Option<u64>,
    index_lock: Mutex<()>,
    write_lock: Mutex<()>,
}

impl DiskStore {
    /// Open (or prepare) a store rooted at `root`
    pub async fn open_at(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| StoreError::io(format!("creating store root {}", root.display()), e))?;
        Ok(Self {
            root,
            quota_bytes: None,
            index_lock: Mutex::new(()),
            write_lock: Mutex::new(()),
        })
    }

    /// Refuse writes once stored bodies exceed `bytes`
    pub fn with_quota(mut self, bytes: Option<u64>) -> Self {
        self.quota_bytes = bytes;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    async fn read_index(&self) -> StoreResult<Vec<PartitionRecord>> {
        let path = self.index_path();
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(StoreError::io(format!("reading {}", path.display()), e)),
        }
    }

    async fn write_index(&self, records: &[PartitionRecord]) -> StoreResult<()> {
        let path = self.index_path();
        let tmp = self.root.join(format!("{}.{}.tmp", INDEX_FILE, Uuid::new_v4()));
        let content = serde_json::to_vec_pretty(records)?;
        fs::write(&tmp, content)
            .await
            .map_err(|e| StoreError::io(format!("writing {}", tmp.display()), e))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| StoreError::io(format!("replacing {}", path.display()), e))
    }

    async fn partition_dir(&self, name: &str) -> StoreResult<Option<PathBuf>> {
        let index = self.read_index().await?;
        Ok(index
            .into_iter()
            .find(|r| r.name == name)
            .map(|r| self.root.join(r.dir)))
    }

    fn meta_path(dir: &Path, key: &CacheKey) -> PathBuf {
        dir.join(format!("{}.json", short_hash(key.as_str(), 32)))
    }

    async fn read_meta(path: &Path) -> StoreResult<Option<EntryMeta>> {
        match fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(format!("reading {}", path.display()), e)),
        }
    }

    /// Metadata stored for `key`, ignoring a file that belongs to another key
    async fn meta_for(dir: &Path, key: &CacheKey) -> StoreResult<Option<EntryMeta>> {
        let path = Self::meta_path(dir, key);
        match Self::read_meta(&path).await? {
            Some(meta) if meta.key == *key => Ok(Some(meta)),
            Some(meta) => {
                warn!("{} holds {}, not {}", path.display(), meta.key, key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn all_metas(dir: &Path) -> StoreResult<Vec<EntryMeta>> {
        let mut metas = Vec::new();
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(metas),
            Err(e) => return Err(StoreError::io(format!("listing {}", dir.display()), e)),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(format!("listing {}", dir.display()), e))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                match Self::read_meta(&path).await {
                    Ok(Some(meta)) => metas.push(meta),
                    Ok(None) => {}
                    Err(e) => warn!("Skipping unreadable entry {}: {}", path.display(), e),
                }
            }
        }

        metas.sort_by(|a, b| a.stored_at.cmp(&b.stored_at).then_with(|| a.key.cmp(&b.key)));
        Ok(metas)
    }

    async fn load_entry(partition: &str, dir: &Path, meta: EntryMeta) -> StoreResult<Entry> {
        let body_path = dir.join(&meta.body_file);
        let body = fs::read(&body_path)
            .await
            .map_err(|e| StoreError::io(format!("reading {}", body_path.display()), e))?;

        if body.len() as u64 != meta.body_len {
            return Err(StoreError::Corrupt {
                partition: partition.to_string(),
                key: meta.key.to_string(),
                reason: format!("body is {} bytes, expected {}", body.len(), meta.body_len),
            });
        }

        Ok(Entry {
            key: meta.key,
            response: Response {
                status: meta.status,
                status_text: meta.status_text,
                headers: meta.headers,
                body,
            },
            stored_at: meta.stored_at,
        })
    }

    async fn used_bytes(&self) -> StoreResult<u64> {
        let mut total = 0;
        for record in self.read_index().await? {
            for meta in Self::all_metas(&self.root.join(&record.dir)).await? {
                total += meta.body_len;
            }
        }
        Ok(total)
    }

    async fn write_entry(
        dir: &Path,
        key: CacheKey,
        response: Response,
        previous: Option<&EntryMeta>,
    ) -> StoreResult<()> {
        let stem = short_hash(key.as_str(), 32);
        let body_file = format!("{}.{}.body", stem, Uuid::new_v4().simple());
        let body_path = dir.join(&body_file);
        let meta_path = dir.join(format!("{}.json", stem));
        let meta_tmp = dir.join(format!("{}.{}.tmp", stem, Uuid::new_v4().simple()));

        let meta = EntryMeta {
            key: key.clone(),
            status: response.status,
            status_text: response.status_text,
            headers: response.headers,
            stored_at: Utc::now(),
            body_file,
            body_len: response.body.len() as u64,
        };

        let result: StoreResult<()> = async {
            fs::write(&body_path, &response.body)
                .await
                .map_err(|e| StoreError::io(format!("writing {}", body_path.display()), e))?;
            fs::write(&meta_tmp, serde_json::to_vec(&meta)?)
                .await
                .map_err(|e| StoreError::io(format!("writing {}", meta_tmp.display()), e))?;
            fs::rename(&meta_tmp, &meta_path)
                .await
                .map_err(|e| StoreError::io(format!("replacing {}", meta_path.display()), e))
        }
        .await;

        if let Err(e) = result {
            let _ = fs::remove_file(&body_path).await;
            let _ = fs::remove_file(&meta_tmp).await;
            return Err(e);
        }

        if let Some(old) = previous {
            if let Err(e) = fs::remove_file(dir.join(&old.body_file)).await {
                debug!("Old body for {} already gone: {}", key, e);
            }
        }

        Ok(())
    }
}

#[async_trait]
impl CacheStore for DiskStore {
    async fn open(&self, name: &str) -> StoreResult<PartitionHandle> {
        let _guard = self.index_lock.lock().await;
        let mut index = self.read_index().await?;

        if !index.iter().any(|r| r.name == name) {
            let dir = format!("p-{}", short_hash(name, 16));
            let path = self.root.join(&dir);
            fs::create_dir_all(&path)
                .await
                .map_err(|e| StoreError::io(format!("creating {}", path.display()), e))?;
            index.push(PartitionRecord {
                name: name.to_string(),
                dir,
            });
            self.write_index(&index).await?;
            debug!("Created partition {}", name);
        }

        Ok(PartitionHandle::new(name))
    }

    async fn has_partition(&self, name: &str) -> StoreResult<bool> {
        Ok(self.read_index().await?.iter().any(|r| r.name == name))
    }

    async fn lookup(
        &self,
        partition: &PartitionHandle,
        url: &Url,
        options: MatchOptions,
    ) -> StoreResult<Option<Entry>> {
        let Some(dir) = self.partition_dir(partition.name()).await? else {
            return Ok(None);
        };

        let exact = CacheKey::from_url(url);
        if let Some(meta) = Self::meta_for(&dir, &exact).await? {
            return Self::load_entry(partition.name(), &dir, meta).await.map(Some);
        }

        if !options.ignore_search {
            return Ok(None);
        }

        let found = Self::all_metas(&dir)
            .await?
            .into_iter()
            .find(|meta| meta.key.matches(url, options));

        match found {
            Some(meta) => Self::load_entry(partition.name(), &dir, meta).await.map(Some),
            None => Ok(None),
        }
    }

    async fn put(
        &self,
        partition: &PartitionHandle,
        key: CacheKey,
        response: Response,
    ) -> StoreResult<()> {
        let dir = self
            .partition_dir(partition.name())
            .await?
            .ok_or_else(|| StoreError::PartitionMissing(partition.name().to_string()))?;

        let _guard = self.write_lock.lock().await;
        let previous = Self::read_meta(&Self::meta_path(&dir, &key)).await?;

        if let Some(quota) = self.quota_bytes {
            let replaced = previous.as_ref().map_or(0, |m| m.body_len);
            let used = self.used_bytes().await?.saturating_sub(replaced);
            let needed = response.body.len() as u64;
            let available = quota.saturating_sub(used);
            if needed > available {
                return Err(StoreError::QuotaExceeded { needed, available });
            }
        }

        Self::write_entry(&dir, key, response, previous.as_ref()).await
    }

    async fn delete_entry(&self, partition: &PartitionHandle, key: &CacheKey) -> StoreResult<bool> {
        let Some(dir) = self.partition_dir(partition.name()).await? else {
            return Ok(false);
        };

        let _guard = self.write_lock.lock().await;
        let meta_path = Self::meta_path(&dir, key);
        let Some(meta) = Self::meta_for(&dir, key).await? else {
            return Ok(false);
        };

        fs::remove_file(&meta_path)
            .await
            .map_err(|e| StoreError::io(format!("removing {}", meta_path.display()), e))?;
        if let Err(e) = fs::remove_file(dir.join(&meta.body_file)).await {
            debug!("Body for {} already gone: {}", key, e);
        }
        Ok(true)
    }

    async fn keys(&self, partition: &PartitionHandle) -> StoreResult<Vec<CacheKey>> {
        let Some(dir) = self.partition_dir(partition.name()).await? else {
            return Ok(Vec::new());
        };
        Ok(Self::all_metas(&dir).await?.into_iter().map(|m| m.key).collect())
    }

    async fn entry_size(
        &self,
        partition: &PartitionHandle,
        key: &CacheKey,
    ) -> StoreResult<Option<u64>> {
        let Some(dir) = self.partition_dir(partition.name()).await? else {
            return Ok(None);
        };
        Ok(Self::meta_for(&dir, key).await?.map(|m| m.body_len))
    }

    async fn list_partitions(&self) -> StoreResult<Vec<String>> {
        Ok(self.read_index().await?.into_iter().map(|r| r.name).collect())
    }

    async fn delete_partition(&self, name: &str) -> StoreResult<bool> {
        let _guard = self.index_lock.lock().await;
        let mut index = self.read_index().await?;

        let Some(pos) = index.iter().position(|r| r.name == name) else {
            return Ok(false);
        };
        let record = index.remove(pos);
        self.write_index(&index).await?;

        let path = self.root.join(&record.dir);
        if let Err(e) = fs::remove_dir_all(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Partition {} unlisted but {} not removed: {}", name, path.display(), e);
            }
        }
        debug!("Deleted partition {}", name);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    async fn body_files(dir: &Path) -> usize {
        let mut bodies = 0;
        let mut listing = fs::read_dir(dir).await.unwrap();
        while let Some(e) = listing.next_entry().await.unwrap() {
            if e.path().extension().is_some_and(|x| x == "body") {
                bodies += 1;
            }
        }
        bodies
    }

    #[test]
    fn short_hash_deterministic() {
        assert_eq!(short_hash("runtime", 16), short_hash("runtime", 16));
        assert_ne!(short_hash("runtime", 16), short_hash("models", 16));
        assert_eq!(short_hash("runtime", 12).len(), 12);
    }

    #[tokio::test]
    async fn entries_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let target = url("https://app.example/index.html");
        {
            let store = DiskStore::open_at(dir.path()).await.unwrap();
            let p = store.open("shell").await.unwrap();
            let response = Response::ok("<html>").with_header("content-type", "text/html");
            store.put(&p, CacheKey::from_url(&target), response).await.unwrap();
        }

        let store = DiskStore::open_at(dir.path()).await.unwrap();
        assert_eq!(store.list_partitions().await.unwrap(), vec!["shell"]);
        let p = store.open("shell").await.unwrap();
        let hit = store.lookup(&p, &target, MatchOptions::EXACT).await.unwrap().unwrap();
        assert_eq!(hit.response.body, b"<html>");
        assert_eq!(hit.response.header("content-type"), Some("text/html"));
    }

    #[tokio::test]
    async fn ignore_search_scans_partition() {
        let dir = TempDir::new().unwrap();
        let store = DiskStore::open_at(dir.path()).await.unwrap();
        let p = store.open("runtime").await.unwrap();
        store
            .put(&p, CacheKey::from_url(&url("https://app.example/app.js?v=9")), Response::ok("js"))
            .await
            .unwrap();

        let bare = url("https://app.example/app.js");
        assert!(store.lookup(&p, &bare, MatchOptions::EXACT).await.unwrap().is_none());
        assert!(store.lookup(&p, &bare, MatchOptions::IGNORE_SEARCH).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn overwrite_replaces_body_file() {
        let dir = TempDir::new().unwrap();
        let store = DiskStore::open_at(dir.path()).await.unwrap();
        let p = store.open("runtime").await.unwrap();
        let key = CacheKey::from_url(&url("https://app.example/a"));

        store.put(&p, key.clone(), Response::ok("first")).await.unwrap();
        store.put(&p, key.clone(), Response::ok("second!")).await.unwrap();

        assert_eq!(store.entry_size(&p, &key).await.unwrap(), Some(7));
        let pdir = store.partition_dir("runtime").await.unwrap().unwrap();
        assert_eq!(body_files(&pdir).await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_overwrites_leave_one_body() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(DiskStore::open_at(dir.path()).await.unwrap());
        let p = store.open("models").await.unwrap();
        let key = CacheKey::from_url(&url("https://m.example/weights.bin"));

        for round in 0..20 {
            let writers = ["left", "right"].map(|side| {
                let store = Arc::clone(&store);
                let p = p.clone();
                let key = key.clone();
                tokio::spawn(async move {
                    let body = format!("{}-{}", side, round);
                    store.put(&p, key, Response::ok(body)).await
                })
            });
            for writer in writers {
                writer.await.unwrap().unwrap();
            }
        }

        let pdir = store.partition_dir("models").await.unwrap().unwrap();
        assert_eq!(body_files(&pdir).await, 1);
        let target = url("https://m.example/weights.bin");
        let hit = store.lookup(&p, &target, MatchOptions::EXACT).await.unwrap().unwrap();
        assert!(hit.response.body.ends_with(b"-19"));
    }

    #[tokio::test]
    async fn metadata_for_another_key_is_not_a_hit() {
        let dir = TempDir::new().unwrap();
        let store = DiskStore::open_at(dir.path()).await.unwrap();
        let p = store.open("runtime").await.unwrap();
        let stored = CacheKey::from_url(&url("https://app.example/a.js"));
        let asked = url("https://app.example/b.js");
        store.put(&p, stored.clone(), Response::ok("a")).await.unwrap();

        // Place a.js metadata where b.js would hash to
        let pdir = store.partition_dir("runtime").await.unwrap().unwrap();
        fs::copy(
            DiskStore::meta_path(&pdir, &stored),
            DiskStore::meta_path(&pdir, &CacheKey::from_url(&asked)),
        )
        .await
        .unwrap();

        assert!(store.lookup(&p, &asked, MatchOptions::EXACT).await.unwrap().is_none());
        assert_eq!(store.entry_size(&p, &CacheKey::from_url(&asked)).await.unwrap(), None);
        assert!(!store.delete_entry(&p, &CacheKey::from_url(&asked)).await.unwrap());
        assert!(store.lookup(&p, &url("https://app.example/a.js"), MatchOptions::EXACT)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn quota_is_enforced() {
        let dir = TempDir::new().unwrap();
        let store = DiskStore::open_at(dir.path()).await.unwrap().with_quota(Some(8));
        let p = store.open("models").await.unwrap();

        store
            .put(&p, CacheKey::from_url(&url("https://m.example/a")), Response::ok("12345"))
            .await
            .unwrap();
        let err = store
            .put(&p, CacheKey::from_url(&url("https://m.example/b")), Response::ok("12345"))
            .await
            .unwrap_err();
        assert!(err.is_quota());
    }

    #[tokio::test]
    async fn truncated_body_is_reported_corrupt() {
        let dir = TempDir::new().unwrap();
        let store = DiskStore::open_at(dir.path()).await.unwrap();
        let p = store.open("models").await.unwrap();
        let target = url("https://m.example/w.bin");
        store.put(&p, CacheKey::from_url(&target), Response::ok("0123456789")).await.unwrap();

        let pdir = store.partition_dir("models").await.unwrap().unwrap();
        let meta = DiskStore::read_meta(&DiskStore::meta_path(&pdir, &CacheKey::from_url(&target)))
            .await
            .unwrap()
            .unwrap();
        fs::write(pdir.join(&meta.body_file), b"0123").await.unwrap();

        let err = store.lookup(&p, &target, MatchOptions::EXACT).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn delete_partition_removes_directory() {
        let dir = TempDir::new().unwrap();
        let store = DiskStore::open_at(dir.path()).await.unwrap();
        store.open("old-shell").await.unwrap();
        let pdir = store.partition_dir("old-shell").await.unwrap().unwrap();
        assert!(pdir.exists());

        assert!(store.delete_partition("old-shell").await.unwrap());
        assert!(!pdir.exists());
        assert!(store.list_partitions().await.unwrap().is_empty());
    }
}
