//! All-or-nothing app-shell precache
//!
//! Every manifest asset is fetched before anything is written. A single
//! failed or non-200 fetch aborts the install, and a partition created by a
//! failed install is removed so it can never be picked up as current.

use crate::error::{OffcacheError, OffcacheResult};
use crate::http::{Fetcher, Request, Response};
use crate::store::{CacheKey, CacheStore};
use futures_util::future::try_join_all;
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

/// Result of a successful install
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub partition: String,
    pub assets: usize,
    pub bytes: u64,
}

async fn fetch_asset(
    fetcher: &dyn Fetcher,
    partition: &str,
    asset: &str,
    url: &Url,
) -> OffcacheResult<(Url, Response)> {
    let failed = |reason: String| OffcacheError::InstallFailed {
        partition: partition.to_string(),
        asset: asset.to_string(),
        reason,
    };

    let response = fetcher
        .fetch(&Request::get(url.clone()))
        .await
        .map_err(|e| failed(e.to_string()))?;
    if !response.is_cacheable() {
        return Err(failed(format!(
            "HTTP {} {}",
            response.status, response.status_text
        )));
    }
    debug!("Fetched {} ({} bytes)", url, response.body_len());
    Ok((url.clone(), response))
}

/// Remove a partition this install created
async fn discard(store: &dyn CacheStore, partition: &str) {
    match store.delete_partition(partition).await {
        Ok(_) => debug!("Discarded partial partition {}", partition),
        Err(e) => warn!("Failed to discard partial partition {}: {}", partition, e),
    }
}

/// Populate `partition` with every asset, or with nothing
///
/// A partition that already existed before the call is never deleted, so
/// re-running a failed install cannot damage a generation that is serving.
pub async fn install(
    store: &dyn CacheStore,
    fetcher: &dyn Fetcher,
    partition: &str,
    assets: &[(String, Url)],
) -> OffcacheResult<InstallReport> {
    let existed = store.has_partition(partition).await?;
    info!("Precaching {} asset(s) into {}", assets.len(), partition);

    let fetched = try_join_all(
        assets
            .iter()
            .map(|(asset, url)| fetch_asset(fetcher, partition, asset, url)),
    )
    .await?;

    let handle = store.open(partition).await?;
    let mut bytes = 0;
    for ((asset, _), (url, response)) in assets.iter().zip(fetched) {
        bytes += response.body_len();
        if let Err(e) = store.put(&handle, CacheKey::from_url(&url), response).await {
            if !existed {
                discard(store, partition).await;
            }
            return Err(OffcacheError::InstallFailed {
                partition: partition.to_string(),
                asset: asset.clone(),
                reason: e.to_string(),
            });
        }
    }

    info!("Precached {} ({} bytes)", partition, bytes);
    Ok(InstallReport {
        partition: partition.to_string(),
        assets: assets.len(),
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Manifest;
    use crate::store::{MatchOptions, MemoryStore, PutFault};
    use crate::testing::ScriptedFetcher;

    fn scope() -> Url {
        Url::parse("https://app.example/").unwrap()
    }

    fn assets() -> Vec<(String, Url)> {
        Manifest::new(["/", "/index.html", "/app.js"])
            .resolve(&scope())
            .unwrap()
    }

    #[tokio::test]
    async fn installs_every_asset() {
        let store = MemoryStore::new();
        let fetcher = ScriptedFetcher::new();
        fetcher
            .ok("https://app.example/", "root")
            .ok("https://app.example/index.html", "index")
            .ok("https://app.example/app.js", "js");

        let report = install(&store, &fetcher, "app-1.0.0-1", &assets()).await.unwrap();

        assert_eq!(report.assets, 3);
        assert_eq!(report.bytes, 11);
        let handle = store.open("app-1.0.0-1").await.unwrap();
        let keys: Vec<String> = store
            .keys(&handle)
            .await
            .unwrap()
            .iter()
            .map(|k| k.to_string())
            .collect();
        assert_eq!(
            keys,
            [
                "https://app.example/",
                "https://app.example/index.html",
                "https://app.example/app.js"
            ]
        );
    }

    #[tokio::test]
    async fn network_failure_leaves_no_partition() {
        let store = MemoryStore::new();
        let fetcher = ScriptedFetcher::new();
        fetcher
            .ok("https://app.example/", "root")
            .ok("https://app.example/index.html", "index")
            .fail("https://app.example/app.js");

        let err = install(&store, &fetcher, "app-1.0.0-2", &assets()).await.unwrap_err();

        assert!(matches!(err, OffcacheError::InstallFailed { ref asset, .. } if asset == "/app.js"));
        assert!(!store.has_partition("app-1.0.0-2").await.unwrap());
    }

    #[tokio::test]
    async fn non_200_status_fails_install() {
        let store = MemoryStore::new();
        let fetcher = ScriptedFetcher::new();
        fetcher
            .ok("https://app.example/", "root")
            .respond(
                "https://app.example/index.html",
                Response::new(404, "Not Found", "missing"),
            )
            .ok("https://app.example/app.js", "js");

        assert!(install(&store, &fetcher, "app-1.0.0-3", &assets()).await.is_err());
        assert!(store.list_partitions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn write_failure_discards_new_partition() {
        let store = MemoryStore::new();
        store.inject_put_fault("https://app.example/app.js", PutFault::Truncate);
        let fetcher = ScriptedFetcher::new();
        fetcher
            .ok("https://app.example/", "root")
            .ok("https://app.example/index.html", "index")
            .ok("https://app.example/app.js", "js");

        assert!(install(&store, &fetcher, "app-1.0.0-4", &assets()).await.is_err());
        assert!(!store.has_partition("app-1.0.0-4").await.unwrap());
    }

    #[tokio::test]
    async fn failed_reinstall_keeps_existing_partition() {
        let store = MemoryStore::new();
        let old = store.open("app-1.0.0-5").await.unwrap();
        let index = Url::parse("https://app.example/index.html").unwrap();
        store
            .put(&old, CacheKey::from_url(&index), Response::ok("old index"))
            .await
            .unwrap();

        let fetcher = ScriptedFetcher::new();
        assert!(install(&store, &fetcher, "app-1.0.0-5", &assets()).await.is_err());

        let hit = store
            .lookup(&old, &index, MatchOptions::EXACT)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.response.body, b"old index");
    }
}
