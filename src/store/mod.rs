//! Partitioned cache storage
//!
//! Models the host's named-cache primitive: a set of independently named
//! partitions, each mapping request URLs to stored responses.
//!
//! # Partition kinds
//!
//! | Kind | Name | Lifecycle |
//! |------|------|-----------|
//! | App shell | `{app}-{version}-{timestamp}` | Created at install, removed at a verified activation |
//! | Runtime | fixed | Created lazily, removed only by clear-all |
//! | Model weights | fixed | Created lazily, removed only by clear-all |
//!
//! Every operation is durable once it returns and individually atomic per
//! entry. There are no multi-entry transactions.

pub mod disk;
pub mod memory;

pub use disk::DiskStore;
pub use memory::{MemoryStore, PutFault};

use crate::http::Response;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use url::Url;

/// Key of a stored entry: the absolute request URL
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn from_url(url: &Url) -> Self {
        Self(url.as_str().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The key with query string and fragment removed
    pub fn without_search(&self) -> &str {
        strip_search(&self.0)
    }

    /// Whether this key answers a lookup for `url`
    pub fn matches(&self, url: &Url, options: MatchOptions) -> bool {
        if options.ignore_search {
            self.without_search() == strip_search(url.as_str())
        } else {
            self.0 == url.as_str()
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn strip_search(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

/// Lookup comparison mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchOptions {
    /// Compare keys without their query string
    pub ignore_search: bool,
}

impl MatchOptions {
    pub const EXACT: Self = Self {
        ignore_search: false,
    };

    pub const IGNORE_SEARCH: Self = Self {
        ignore_search: true,
    };
}

/// One cached request/response pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: CacheKey,
    pub response: Response,
    pub stored_at: DateTime<Utc>,
}

impl Entry {
    pub fn new(key: CacheKey, response: Response) -> Self {
        Self {
            key,
            response,
            stored_at: Utc::now(),
        }
    }

    pub fn size(&self) -> u64 {
        self.response.body_len()
    }
}

/// Handle to an opened partition
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionHandle {
    name: String,
}

impl PartitionHandle {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Cache store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage quota exceeded: need {needed} bytes, {available} available")]
    QuotaExceeded { needed: u64, available: u64 },

    #[error("partition not found: {0}")]
    PartitionMissing(String),

    #[error("corrupt entry {key} in {partition}: {reason}")]
    Corrupt {
        partition: String,
        key: String,
        reason: String,
    },

    #[error("write of {key} failed: {reason}")]
    WriteFailed { key: String, reason: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn is_quota(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Named-partition cache storage
///
/// Implementations must tolerate interleaved calls from independent request
/// handlers; `lookup` and `put` are each atomic for a single entry.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Open a partition, creating it if it does not exist
    async fn open(&self, name: &str) -> StoreResult<PartitionHandle>;

    /// Whether a partition exists, without creating it
    async fn has_partition(&self, name: &str) -> StoreResult<bool>;

    /// Find the entry answering `url`. With `ignore_search`, an exact key
    /// match wins over other keys that differ only in query string.
    async fn lookup(
        &self,
        partition: &PartitionHandle,
        url: &Url,
        options: MatchOptions,
    ) -> StoreResult<Option<Entry>>;

    /// Insert or overwrite the entry for `key`
    async fn put(
        &self,
        partition: &PartitionHandle,
        key: CacheKey,
        response: Response,
    ) -> StoreResult<()>;

    /// Remove one entry; returns whether it existed
    async fn delete_entry(&self, partition: &PartitionHandle, key: &CacheKey) -> StoreResult<bool>;

    /// Keys in insertion order
    async fn keys(&self, partition: &PartitionHandle) -> StoreResult<Vec<CacheKey>>;

    /// Body size of an entry without loading it
    async fn entry_size(&self, partition: &PartitionHandle, key: &CacheKey)
        -> StoreResult<Option<u64>>;

    /// Partition names in creation order
    async fn list_partitions(&self) -> StoreResult<Vec<String>>;

    /// Remove a partition and all its entries; returns whether it existed
    async fn delete_partition(&self, name: &str) -> StoreResult<bool>;
}

/// Look up `url` in `name` without creating the partition
pub async fn lookup_existing(
    store: &dyn CacheStore,
    name: &str,
    url: &Url,
    options: MatchOptions,
) -> StoreResult<Option<Entry>> {
    if !store.has_partition(name).await? {
        return Ok(None);
    }
    let partition = store.open(name).await?;
    store.lookup(&partition, url, options).await
}
