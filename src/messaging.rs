//! Control plane between controlling pages and the worker
//!
//! Pages send `{"type":"SKIP_WAITING"}` or `{"type":"CLEAR_ALL_CACHES"}`.
//! The worker answers a clear with a `{"type":"CACHE_CLEARED"}` broadcast to
//! every controlled page.

use crate::error::{OffcacheError, OffcacheResult};
use crate::store::CacheStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Page to worker directive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Activate a waiting worker without waiting for pages to close
    SkipWaiting,
    /// Delete every partition, model weights included
    #[serde(alias = "CLEAR_CACHE")]
    ClearAllCaches,
}

impl ControlMessage {
    /// Parse a message as posted by a page
    pub fn parse(json: &str) -> OffcacheResult<Self> {
        serde_json::from_str(json).map_err(|_| OffcacheError::UnknownMessage(json.to_string()))
    }
}

/// Worker to page notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    CacheCleared,
}

/// The set of pages a worker controls
#[async_trait]
pub trait ClientHub: Send + Sync {
    /// Take control of every open page; returns how many are controlled
    async fn claim(&self) -> usize;

    /// Ask the host to activate this worker immediately
    async fn skip_waiting(&self);

    /// Post a message to every controlled page; returns how many received it
    async fn broadcast(&self, message: WorkerMessage) -> usize;
}

/// Pages modelled as subscribers of a broadcast channel
pub struct BroadcastClients {
    sender: broadcast::Sender<WorkerMessage>,
    claimed: AtomicBool,
    skip_waiting: AtomicBool,
}

impl BroadcastClients {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(16);
        Self {
            sender,
            claimed: AtomicBool::new(false),
            skip_waiting: AtomicBool::new(false),
        }
    }

    /// Open a page
    pub fn subscribe(&self) -> broadcast::Receiver<WorkerMessage> {
        self.sender.subscribe()
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::SeqCst)
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }
}

impl Default for BroadcastClients {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClientHub for BroadcastClients {
    async fn claim(&self) -> usize {
        self.claimed.store(true, Ordering::SeqCst);
        self.sender.receiver_count()
    }

    async fn skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::SeqCst);
    }

    async fn broadcast(&self, message: WorkerMessage) -> usize {
        // No receivers is not an error: nothing is open
        self.sender.send(message).unwrap_or(0)
    }
}

/// Outcome of a clear-all-caches directive
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClearReport {
    pub deleted: Vec<String>,
    pub notified: usize,
}

/// Delete every partition regardless of kind, then notify all pages
///
/// The only path that removes model weights. The broadcast is sent only
/// once every deletion succeeded.
pub async fn clear_all_caches(
    store: &dyn CacheStore,
    clients: &dyn ClientHub,
) -> OffcacheResult<ClearReport> {
    let names = store.list_partitions().await?;
    let mut deleted = Vec::with_capacity(names.len());
    for name in names {
        if store.delete_partition(&name).await? {
            debug!("Deleted partition {}", name);
            deleted.push(name);
        }
    }

    let notified = clients.broadcast(WorkerMessage::CacheCleared).await;
    info!(
        "Cleared {} partition(s), notified {} page(s)",
        deleted.len(),
        notified
    );
    Ok(ClearReport { deleted, notified })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Response;
    use crate::store::{CacheKey, MemoryStore};
    use url::Url;

    #[test]
    fn parses_control_messages() {
        assert_eq!(
            ControlMessage::parse(r#"{"type":"SKIP_WAITING"}"#).unwrap(),
            ControlMessage::SkipWaiting
        );
        assert_eq!(
            ControlMessage::parse(r#"{"type":"CLEAR_ALL_CACHES"}"#).unwrap(),
            ControlMessage::ClearAllCaches
        );
        assert_eq!(
            ControlMessage::parse(r#"{"type":"CLEAR_CACHE"}"#).unwrap(),
            ControlMessage::ClearAllCaches
        );
    }

    #[test]
    fn rejects_unknown_message() {
        let err = ControlMessage::parse(r#"{"type":"RELOAD"}"#).unwrap_err();
        assert!(matches!(err, OffcacheError::UnknownMessage(_)));
    }

    #[test]
    fn cache_cleared_wire_format() {
        assert_eq!(
            serde_json::to_string(&WorkerMessage::CacheCleared).unwrap(),
            r#"{"type":"CACHE_CLEARED"}"#
        );
    }

    #[tokio::test]
    async fn clear_all_deletes_everything_and_broadcasts() {
        let store = MemoryStore::new();
        for name in ["assistant-1.0.0-1", "assistant-runtime", "transformers-cache"] {
            let p = store.open(name).await.unwrap();
            let url = Url::parse("https://m.example/w.bin").unwrap();
            store
                .put(&p, CacheKey::from_url(&url), Response::ok("w"))
                .await
                .unwrap();
        }
        let clients = BroadcastClients::new();
        let mut page_a = clients.subscribe();
        let mut page_b = clients.subscribe();

        let report = clear_all_caches(&store, &clients).await.unwrap();

        assert_eq!(report.deleted.len(), 3);
        assert_eq!(report.notified, 2);
        assert!(store.list_partitions().await.unwrap().is_empty());
        assert_eq!(page_a.recv().await.unwrap(), WorkerMessage::CacheCleared);
        assert_eq!(page_b.recv().await.unwrap(), WorkerMessage::CacheCleared);
    }

    #[tokio::test]
    async fn clear_with_no_pages() {
        let store = MemoryStore::new();
        let clients = BroadcastClients::new();
        let report = clear_all_caches(&store, &clients).await.unwrap();
        assert_eq!(report, ClearReport::default());
    }

    #[tokio::test]
    async fn claim_counts_pages() {
        let clients = BroadcastClients::new();
        let _page = clients.subscribe();
        assert!(!clients.is_claimed());
        assert_eq!(clients.claim().await, 1);
        assert!(clients.is_claimed());
    }
}
