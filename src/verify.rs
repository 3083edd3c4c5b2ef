//! Integrity check of an app-shell partition against its manifest

use crate::error::OffcacheResult;
use crate::store::{CacheStore, MatchOptions};
use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

/// Which manifest assets a partition is missing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verification {
    pub partition: String,
    /// True iff `missing` is empty
    pub complete: bool,
    pub missing: Vec<String>,
}

impl Verification {
    fn new(partition: &str, missing: Vec<String>) -> Self {
        Self {
            partition: partition.to_string(),
            complete: missing.is_empty(),
            missing,
        }
    }
}

/// Look up every asset in `partition`, collecting the ones with no entry
///
/// A missing partition is missing every asset. An entry that cannot be
/// read back counts as missing.
pub async fn verify(
    store: &dyn CacheStore,
    partition: &str,
    assets: &[(String, Url)],
) -> OffcacheResult<Verification> {
    if !store.has_partition(partition).await? {
        debug!("Partition {} does not exist", partition);
        let missing = assets.iter().map(|(asset, _)| asset.clone()).collect();
        return Ok(Verification::new(partition, missing));
    }

    let handle = store.open(partition).await?;
    let handle = &handle;
    let lookups = assets.iter().map(|(asset, url)| async move {
        match store.lookup(handle, url, MatchOptions::EXACT).await {
            Ok(Some(_)) => None,
            Ok(None) => Some(asset.clone()),
            Err(e) => {
                warn!("Unreadable entry for {} in {}: {}", asset, partition, e);
                Some(asset.clone())
            }
        }
    });
    let missing: Vec<String> = join_all(lookups).await.into_iter().flatten().collect();

    Ok(Verification::new(partition, missing))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Response;
    use crate::manifest::Manifest;
    use crate::store::{CacheKey, MemoryStore};

    fn assets() -> Vec<(String, Url)> {
        Manifest::new(["/", "/index.html", "/app.js"])
            .resolve(&Url::parse("https://app.example/").unwrap())
            .unwrap()
    }

    #[tokio::test]
    async fn complete_partition() {
        let store = MemoryStore::new();
        let p = store.open("app-1.0.0-1").await.unwrap();
        for (_, url) in assets() {
            store.put(&p, CacheKey::from_url(&url), Response::ok("x")).await.unwrap();
        }

        let verification = verify(&store, "app-1.0.0-1", &assets()).await.unwrap();
        assert!(verification.complete);
        assert!(verification.missing.is_empty());
    }

    #[tokio::test]
    async fn reports_missing_in_manifest_order() {
        let store = MemoryStore::new();
        let p = store.open("app-1.0.0-1").await.unwrap();
        let (_, index) = &assets()[1];
        store.put(&p, CacheKey::from_url(index), Response::ok("x")).await.unwrap();

        let verification = verify(&store, "app-1.0.0-1", &assets()).await.unwrap();
        assert!(!verification.complete);
        assert_eq!(verification.missing, ["/", "/app.js"]);
    }

    #[tokio::test]
    async fn absent_partition_is_missing_everything() {
        let store = MemoryStore::new();
        let verification = verify(&store, "app-9.9.9-9", &assets()).await.unwrap();
        assert_eq!(verification.missing.len(), 3);
        assert!(!store.has_partition("app-9.9.9-9").await.unwrap());
    }

    #[tokio::test]
    async fn empty_manifest_is_complete() {
        let store = MemoryStore::new();
        store.open("app-1.0.0-1").await.unwrap();
        let verification = verify(&store, "app-1.0.0-1", &[]).await.unwrap();
        assert!(verification.complete);
    }
}
