//! Generation hand-over at activation
//!
//! Cleanup is gated on verification: old partitions are deleted only when
//! the new app shell is complete. Control of open pages is taken either way.

use crate::error::OffcacheResult;
use crate::generation::PartitionLayout;
use crate::messaging::ClientHub;
use crate::store::CacheStore;
use crate::verify::{verify, Verification};
use serde::Serialize;
use tracing::{info, warn};
use url::Url;

/// What an activation did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivationReport {
    pub verification: Verification,
    /// Partitions removed by this activation
    pub deleted: Vec<String>,
    /// Partitions left in place
    pub kept: Vec<String>,
    /// Number of pages controlled after claiming
    pub claimed: usize,
}

impl ActivationReport {
    pub fn cleaned_up(&self) -> bool {
        self.verification.complete
    }
}

/// Verify `current`, remove everything outside the preserved set if it is
/// complete, then claim open pages
///
/// Store errors only cost the cleanup: an unverifiable partition counts as
/// incomplete, and a failed listing or deletion is logged and left for the
/// next activation. The claim always happens.
pub async fn activate(
    store: &dyn CacheStore,
    clients: &dyn ClientHub,
    layout: &PartitionLayout,
    current: &str,
    assets: &[(String, Url)],
) -> OffcacheResult<ActivationReport> {
    let verification = match verify(store, current, assets).await {
        Ok(verification) => verification,
        Err(e) => {
            warn!("Could not verify {}: {}", current, e);
            Verification {
                partition: current.to_string(),
                complete: false,
                missing: assets.iter().map(|(entry, _)| entry.clone()).collect(),
            }
        }
    };

    let mut deleted = Vec::new();
    let mut kept = Vec::new();
    let names = match store.list_partitions().await {
        Ok(names) => names,
        Err(e) => {
            warn!("Could not list partitions, skipping cleanup: {}", e);
            Vec::new()
        }
    };

    if verification.complete {
        let preserved = layout.preserved_set(current);
        for name in names {
            if preserved.contains(&name) {
                kept.push(name);
                continue;
            }
            match store.delete_partition(&name).await {
                Ok(true) => {
                    info!("Deleted stale partition {}", name);
                    deleted.push(name);
                }
                Ok(false) => {}
                Err(e) => {
                    warn!("Failed to delete stale partition {}: {}", name, e);
                    kept.push(name);
                }
            }
        }
    } else {
        warn!(
            "Partition {} is incomplete, skipping cleanup. Missing: {}",
            current,
            verification.missing.join(", ")
        );
        kept = names;
    }

    let claimed = clients.claim().await;
    info!("Activated {}, controlling {} page(s)", current, claimed);

    Ok(ActivationReport {
        verification,
        deleted,
        kept,
        claimed,
    })
}
