//! Per-request routing
//!
//! Each intercepted request is classified by origin and handled by one of
//! two strategies:
//!
//! - **Same origin**: cache first over the current app shell then the
//!   runtime partition, ignoring query strings. A hit is returned at once
//!   while a detached task refreshes the runtime copy from the network.
//! - **Cross origin**: the URL is normalized onto the mirror, looked up in
//!   the model-weights partition, then looked up under its original
//!   (legacy) form. Only when both miss is the original request sent over
//!   the network, and a 200 response is written through under the
//!   normalized key.
//!
//! Caching failures never reach the caller. A network failure with nothing
//! cached becomes a synthetic 503 response.

use crate::generation::PartitionLayout;
use crate::http::{Fetcher, Request, Response};
use crate::normalize::UrlNormalizer;
use crate::store::{lookup_existing, CacheKey, CacheStore, Entry, MatchOptions};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::{Origin, Url};

/// Where a routed response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteOutcome {
    /// Served from a partition under the request's own (or normalized) key
    CacheHit,
    /// Served from the model-weights partition under a pre-normalization key
    LegacyHit,
    /// Served from the network
    Network,
    /// Network failed and nothing was cached: synthetic 503
    Unavailable,
}

impl fmt::Display for RouteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::CacheHit => "cache",
            Self::LegacyHit => "cache (legacy key)",
            Self::Network => "network",
            Self::Unavailable => "unavailable",
        };
        f.write_str(label)
    }
}

/// A routed response
#[derive(Debug)]
pub struct Routed {
    pub response: Response,
    pub outcome: RouteOutcome,
    /// Background refresh started by a same-origin hit. Dropping the handle
    /// detaches the task; it keeps running.
    pub refresh: Option<JoinHandle<()>>,
}

impl Routed {
    fn new(response: Response, outcome: RouteOutcome) -> Self {
        Self {
            response,
            outcome,
            refresh: None,
        }
    }

    fn unavailable(url: &Url) -> Self {
        Self::new(
            Response::service_unavailable(&format!("Offline: {} is not cached", url)),
            RouteOutcome::Unavailable,
        )
    }
}

/// Write an entry, removing any partial copy if the write fails
async fn store_entry(
    store: Arc<dyn CacheStore>,
    partition: String,
    key: CacheKey,
    response: Response,
) -> bool {
    let handle = match store.open(&partition).await {
        Ok(handle) => handle,
        Err(e) => {
            warn!("Cannot open {} for {}: {}", partition, key, e);
            return false;
        }
    };
    match store.put(&handle, key.clone(), response).await {
        Ok(()) => {
            debug!("Cached {} in {}", key, partition);
            true
        }
        Err(e) => {
            warn!("Caching {} in {} failed: {}", key, partition, e);
            if let Err(e) = store.delete_entry(&handle, &key).await {
                warn!("Removing partial entry {} failed: {}", key, e);
            }
            false
        }
    }
}

/// Request router for one worker generation
#[derive(Clone)]
pub struct Router {
    store: Arc<dyn CacheStore>,
    fetcher: Arc<dyn Fetcher>,
    normalizer: UrlNormalizer,
    origin: Origin,
    app_shell: String,
    layout: PartitionLayout,
}

impl Router {
    pub fn new(
        store: Arc<dyn CacheStore>,
        fetcher: Arc<dyn Fetcher>,
        normalizer: UrlNormalizer,
        scope: &Url,
        app_shell: impl Into<String>,
        layout: PartitionLayout,
    ) -> Self {
        Self {
            store,
            fetcher,
            normalizer,
            origin: scope.origin(),
            app_shell: app_shell.into(),
            layout,
        }
    }

    pub fn app_shell(&self) -> &str {
        &self.app_shell
    }

    /// Route one request. Never fails: every error becomes a response.
    pub async fn route(&self, request: &Request) -> Routed {
        if request.same_origin(&self.origin) {
            self.same_origin(request).await
        } else {
            self.cross_origin(request).await
        }
    }

    async fn lookup(&self, partition: &str, url: &Url) -> Option<Entry> {
        match lookup_existing(self.store.as_ref(), partition, url, MatchOptions::IGNORE_SEARCH)
            .await
        {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Lookup of {} in {} failed: {}", url, partition, e);
                None
            }
        }
    }

    /// Write on a task of its own so an abandoned caller cannot cut it short
    async fn write_through(&self, partition: &str, key: CacheKey, response: Response) {
        let task = tokio::spawn(store_entry(
            Arc::clone(&self.store),
            partition.to_string(),
            key,
            response,
        ));
        if let Err(e) = task.await {
            warn!("Cache write task failed: {}", e);
        }
    }

    fn spawn_refresh(&self, request: Request) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let fetcher = Arc::clone(&self.fetcher);
        let runtime = self.layout.runtime.clone();
        tokio::spawn(async move {
            match fetcher.fetch(&request).await {
                Ok(response) if response.is_cacheable() => {
                    store_entry(store, runtime, CacheKey::from_url(request.url()), response).await;
                }
                Ok(response) => {
                    debug!("Refresh of {} returned {}", request.url(), response.status);
                }
                Err(e) => debug!("Refresh of {} failed: {}", request.url(), e),
            }
        })
    }

    async fn same_origin(&self, request: &Request) -> Routed {
        let url = request.url();
        if request.is_get() {
            for partition in [self.app_shell.as_str(), self.layout.runtime.as_str()] {
                if let Some(entry) = self.lookup(partition, url).await {
                    debug!("{} served from {}", url, partition);
                    let mut routed = Routed::new(entry.response, RouteOutcome::CacheHit);
                    routed.refresh = Some(self.spawn_refresh(request.clone()));
                    return routed;
                }
            }
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if request.is_get() && response.is_cacheable() {
                    self.write_through(
                        &self.layout.runtime,
                        CacheKey::from_url(url),
                        response.clone(),
                    )
                    .await;
                }
                Routed::new(response, RouteOutcome::Network)
            }
            Err(e) => {
                warn!("{} unavailable: {}", url, e);
                Routed::unavailable(url)
            }
        }
    }

    async fn cross_origin(&self, request: &Request) -> Routed {
        let url = request.url();
        let normalized = self.normalizer.normalize(url);
        let model_weights = self.layout.model_weights.as_str();

        if request.is_get() {
            if let Some(entry) = self.lookup(model_weights, &normalized).await {
                debug!("{} served from {} as {}", url, model_weights, normalized);
                return Routed::new(entry.response, RouteOutcome::CacheHit);
            }
            if let Some(legacy) = self.normalizer.legacy_key(url) {
                if let Some(entry) = self.lookup(model_weights, &legacy).await {
                    debug!("{} served from {} under legacy key", url, model_weights);
                    return Routed::new(entry.response, RouteOutcome::LegacyHit);
                }
            }
        }

        // The original request goes out: normalization only shapes the key
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if request.is_get() && response.is_cacheable() {
                    self.write_through(
                        model_weights,
                        CacheKey::from_url(&normalized),
                        response.clone(),
                    )
                    .await;
                }
                Routed::new(response, RouteOutcome::Network)
            }
            Err(e) => {
                warn!("{} unavailable: {}", url, e);
                Routed::unavailable(url)
            }
        }
    }
}
