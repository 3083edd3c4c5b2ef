//! Worker lifecycle
//!
//! A [`ServiceWorker`] is one generation of the app shell. The host drives
//! it through install, activate, fetch and message events. Nothing here
//! outlives the process: a respawned worker is rebuilt from the same build
//! manifest and finds its partition by name.

use crate::activate::{activate, ActivationReport};
use crate::config::Config;
use crate::error::{OffcacheError, OffcacheResult};
use crate::generation::{Generation, PartitionLayout};
use crate::http::{Fetcher, Request};
use crate::manifest::{BuildManifest, Manifest};
use crate::messaging::{clear_all_caches, ClearReport, ClientHub, ControlMessage};
use crate::normalize::UrlNormalizer;
use crate::precache::{install, InstallReport};
use crate::router::{Routed, Router};
use crate::store::CacheStore;
use crate::verify::{verify, Verification};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use url::Url;

/// Lifecycle state of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Install failed; the worker handles no further events
    Redundant,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Parsed => "parsed",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Activated => "activated",
            Self::Redundant => "redundant",
        };
        f.write_str(label)
    }
}

/// Result of a control message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageOutcome {
    SkipWaiting,
    Cleared(ClearReport),
}

/// Host-provided collaborators
#[derive(Clone)]
pub struct WorkerHost {
    pub store: Arc<dyn CacheStore>,
    pub fetcher: Arc<dyn Fetcher>,
    pub clients: Arc<dyn ClientHub>,
}

/// One app-shell generation and its event handlers
pub struct ServiceWorker {
    host: WorkerHost,
    generation: Generation,
    manifest: Manifest,
    scope: Url,
    layout: PartitionLayout,
    router: Router,
    state: Mutex<WorkerState>,
}

impl ServiceWorker {
    pub fn new(
        host: WorkerHost,
        build: BuildManifest,
        scope: Url,
        layout: PartitionLayout,
        normalizer: UrlNormalizer,
    ) -> Self {
        let router = Router::new(
            Arc::clone(&host.store),
            Arc::clone(&host.fetcher),
            normalizer,
            &scope,
            build.generation.partition_name(),
            layout.clone(),
        );
        Self {
            host,
            generation: build.generation,
            manifest: build.precache.assets,
            scope,
            layout,
            router,
            state: Mutex::new(WorkerState::Parsed),
        }
    }

    /// Build a worker from configuration
    pub fn from_config(
        config: &Config,
        host: WorkerHost,
        build: BuildManifest,
    ) -> OffcacheResult<Self> {
        let scope = Url::parse(&config.app.scope)
            .map_err(|e| OffcacheError::invalid_url(&config.app.scope, e))?;
        let normalizer = UrlNormalizer::from_config(&config.mirror)?;
        Ok(Self::new(
            host,
            build,
            scope,
            PartitionLayout::from_config(config),
            normalizer,
        ))
    }

    pub fn generation(&self) -> &Generation {
        &self.generation
    }

    /// Name of this worker's app-shell partition
    pub fn partition(&self) -> String {
        self.generation.partition_name()
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.lock().await
    }

    async fn set_state(&self, state: WorkerState) {
        *self.state.lock().await = state;
    }

    async fn ensure_live(&self) -> OffcacheResult<()> {
        if self.state().await == WorkerState::Redundant {
            return Err(OffcacheError::WorkerRedundant);
        }
        Ok(())
    }

    /// Install event: precache the manifest, then ask to skip waiting
    pub async fn install(&self) -> OffcacheResult<InstallReport> {
        self.ensure_live().await?;
        self.set_state(WorkerState::Installing).await;

        let assets = self.manifest.resolve(&self.scope)?;
        let partition = self.partition();
        match install(
            self.host.store.as_ref(),
            self.host.fetcher.as_ref(),
            &partition,
            &assets,
        )
        .await
        {
            Ok(report) => {
                self.set_state(WorkerState::Installed).await;
                self.host.clients.skip_waiting().await;
                Ok(report)
            }
            Err(e) => {
                warn!("Install of {} failed: {}", partition, e);
                self.set_state(WorkerState::Redundant).await;
                Err(e)
            }
        }
    }

    /// Check this generation's partition against its manifest
    pub async fn verify(&self) -> OffcacheResult<Verification> {
        let assets = self.manifest.resolve(&self.scope)?;
        verify(self.host.store.as_ref(), &self.partition(), &assets).await
    }

    /// Activate event: verify, clean up if complete, claim pages
    ///
    /// Allowed from any live state, since the host may respawn a worker
    /// between install and activation.
    pub async fn activate(&self) -> OffcacheResult<ActivationReport> {
        self.ensure_live().await?;
        let previous = self.state().await;
        self.set_state(WorkerState::Activating).await;

        let partition = self.partition();
        let result = match self.manifest.resolve(&self.scope) {
            Ok(assets) => {
                activate(
                    self.host.store.as_ref(),
                    self.host.clients.as_ref(),
                    &self.layout,
                    &partition,
                    &assets,
                )
                .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(report) => {
                self.set_state(WorkerState::Activated).await;
                Ok(report)
            }
            Err(e) => {
                warn!("Activation of {} failed: {}", partition, e);
                self.set_state(previous).await;
                Err(e)
            }
        }
    }

    /// Fetch event
    pub async fn handle_fetch(&self, request: &Request) -> OffcacheResult<Routed> {
        self.ensure_live().await?;
        Ok(self.router.route(request).await)
    }

    /// Message event
    pub async fn handle_message(&self, message: ControlMessage) -> OffcacheResult<MessageOutcome> {
        self.ensure_live().await?;
        match message {
            ControlMessage::SkipWaiting => {
                info!("Skip waiting requested for {}", self.partition());
                self.host.clients.skip_waiting().await;
                Ok(MessageOutcome::SkipWaiting)
            }
            ControlMessage::ClearAllCaches => {
                let report =
                    clear_all_caches(self.host.store.as_ref(), self.host.clients.as_ref()).await?;
                Ok(MessageOutcome::Cleared(report))
            }
        }
    }
}
