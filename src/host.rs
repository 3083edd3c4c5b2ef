//! Host wiring for the command line
//!
//! Stands in for the browser: a durable on-disk store, a real HTTP client,
//! and a client hub with no open pages.

use crate::config::{Config, ConfigManager};
use crate::error::{OffcacheError, OffcacheResult};
use crate::generation::{Generation, PartitionLayout};
use crate::http::{Fetcher, HttpFetcher};
use crate::manifest::BuildManifest;
use crate::messaging::BroadcastClients;
use crate::normalize::UrlNormalizer;
use crate::router::Router;
use crate::store::{CacheStore, DiskStore};
use crate::worker::{ServiceWorker, WorkerHost};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Open the store configured in `[storage]`
pub async fn open_store(config: &Config) -> OffcacheResult<Arc<DiskStore>> {
    let root = ConfigManager::store_root(config);
    debug!("Opening cache store at {}", root.display());
    let store = DiskStore::open_at(root)
        .await?
        .with_quota(config.storage.quota_bytes());
    Ok(Arc::new(store))
}

/// HTTP client configured from `[network]`
pub fn create_fetcher(config: &Config) -> Arc<HttpFetcher> {
    Arc::new(HttpFetcher::new(
        Duration::from_secs(config.network.timeout_secs),
        config.network.user_agent.clone(),
    ))
}

/// A worker for the build described by `manifest`
pub async fn load_worker(
    config: &Config,
    manifest: &Path,
) -> OffcacheResult<(ServiceWorker, Arc<BroadcastClients>)> {
    let build = BuildManifest::load(manifest).await?;
    let clients = Arc::new(BroadcastClients::new());
    let fetcher = create_fetcher(config);
    debug!(
        "Loading worker for {} with {} fetcher",
        build.generation.partition_name(),
        fetcher.name()
    );
    let host = WorkerHost {
        store: open_store(config).await?,
        fetcher,
        clients: clients.clone(),
    };
    let worker = ServiceWorker::from_config(config, host, build)?;
    Ok((worker, clients))
}

/// A router serving the newest installed app shell
///
/// The current generation is re-derived from partition names.
pub async fn latest_router(
    config: &Config,
    store: Arc<dyn CacheStore>,
    fetcher: Arc<dyn Fetcher>,
) -> OffcacheResult<Router> {
    let scope = Url::parse(&config.app.scope)
        .map_err(|e| OffcacheError::invalid_url(&config.app.scope, e))?;
    let names = store.list_partitions().await?;
    let app_shell = match Generation::latest(&config.app.name, &names) {
        Some(generation) => generation.partition_name(),
        None => {
            debug!("No installed app shell for {}", config.app.name);
            String::new()
        }
    };
    Ok(Router::new(
        store,
        fetcher,
        UrlNormalizer::from_config(&config.mirror)?,
        &scope,
        app_shell,
        PartitionLayout::from_config(config),
    ))
}
