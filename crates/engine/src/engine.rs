//! The engine context: one per running version.
//!
//! Owns the classifier, partitions and strategy executor, drives the
//! install/activate lifecycle and dispatches page messages.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sigcache_core::cache::meta::ACTIVE_VERSION_KEY;
use sigcache_core::{AppConfig, CacheDb, Error, Partition, Request, Response};
use url::Url;

use crate::classify::{Classifier, Route};
use crate::fallback::FallbackProvider;
use crate::fetch::Fetcher;
use crate::lifecycle::{Lifecycle, WorkerState};
use crate::message::{Location, Message, Reply};
use crate::observer::{Observer, TracingObserver};
use crate::push::{ClickAction, ClientWindow, Notification, resolve_click};
use crate::registry::{PartitionRegistry, PartitionUsage};
use crate::strategy::{Executed, StrategyExecutor};

const SYNC_TAGS: &[&str] = &["sync-locations", "sync-location"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct InstallReport {
    pub version: String,
    /// Critical assets written to the static partition.
    pub cached: Vec<String>,
    /// Critical assets that could not be fetched or stored.
    pub failed: Vec<String>,
    pub activated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ActivateReport {
    pub deleted: Vec<String>,
    pub purged: u64,
}

#[derive(Debug)]
pub enum FetchDisposition {
    /// Not intercepted; the caller performs a plain network request.
    Bypass,
    Handled { route: Route, executed: Executed },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct EngineStatus {
    pub state: WorkerState,
    pub version: String,
    pub active_version: Option<String>,
    pub controlling: bool,
    pub tracking: bool,
    pub partitions: Vec<PartitionUsage>,
    pub total_size: u64,
}

pub struct Engine {
    classifier: Classifier,
    registry: PartitionRegistry,
    executor: StrategyExecutor,
    fetcher: Arc<dyn Fetcher>,
    observer: Arc<dyn Observer>,
    lifecycle: Lifecycle,
    scope: Url,
    critical_assets: Vec<Url>,
    skip_waiting_on_install: bool,
    max_age: Option<Duration>,
    tracking: AtomicBool,
}

impl Engine {
    /// Build an engine that reports background failures through `tracing`.
    pub fn new(db: CacheDb, config: &AppConfig, fetcher: Arc<dyn Fetcher>) -> Result<Self, Error> {
        Self::with_observer(db, config, fetcher, Arc::new(TracingObserver))
    }

    pub fn with_observer(
        db: CacheDb, config: &AppConfig, fetcher: Arc<dyn Fetcher>, observer: Arc<dyn Observer>,
    ) -> Result<Self, Error> {
        let classifier = Classifier::new(config)?;
        let registry = PartitionRegistry::new(db, config)?;
        let fallback = FallbackProvider::new(registry.clone(), config)?;
        let executor = StrategyExecutor::new(registry.clone(), fetcher.clone(), fallback, observer.clone())
            .with_tile_timeout(config.tile_timeout())
            .with_max_age(config.entry_max_age());
        let scope = config.scope_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let critical_assets = config.critical_asset_urls().map_err(|e| Error::InvalidUrl(e.to_string()))?;

        Ok(Self {
            classifier,
            registry,
            executor,
            fetcher,
            observer,
            lifecycle: Lifecycle::new(),
            scope,
            critical_assets,
            skip_waiting_on_install: config.skip_waiting_on_install,
            max_age: config.entry_max_age(),
            tracking: AtomicBool::new(false),
        })
    }

    pub fn registry(&self) -> &PartitionRegistry {
        &self.registry
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Root URL of the application scope.
    pub fn scope(&self) -> &Url {
        &self.scope
    }

    pub fn version(&self) -> &str {
        self.registry.version()
    }

    pub async fn state(&self) -> WorkerState {
        self.lifecycle.state().await
    }

    /// Open every partition and pre-warm the static partition.
    ///
    /// Activates right away on a first install, a reinstall of the same
    /// version, or when skip-waiting-on-install is set. Otherwise the engine
    /// stays `waiting` until a `SKIP_WAITING` message.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        if self.state().await != WorkerState::Installing {
            return Err(Error::InvalidInput(format!("install while {}", self.state().await)));
        }
        tracing::info!(version = self.version(), "installing");

        self.registry.open_all().await?;
        let (cached, failed) = self.prewarm().await?;
        self.lifecycle.advance(WorkerState::Installing, WorkerState::Waiting).await?;

        let previous = self.registry.db().get_meta(ACTIVE_VERSION_KEY).await?;
        let activate_now = match previous.as_deref() {
            None => true,
            Some(previous) => previous == self.version() || self.skip_waiting_on_install,
        };

        if activate_now {
            self.activate().await?;
        } else {
            tracing::info!(version = self.version(), previous = ?previous, "waiting for SKIP_WAITING");
        }

        Ok(InstallReport { version: self.version().to_string(), cached, failed, activated: activate_now })
    }

    /// Best-effort fetch of every critical asset into the static partition.
    async fn prewarm(&self) -> Result<(Vec<String>, Vec<String>), Error> {
        let store = self.registry.open(Partition::Static).await?;
        let mut cached = Vec::new();
        let mut failed = Vec::new();

        for url in &self.critical_assets {
            let request = Request::get(url.clone());
            let outcome = match self.fetcher.fetch(&request).await {
                Ok(response) if response.is_cacheable() => store.put(&request, &response).await,
                Ok(response) => Err(Error::HttpError(format!("{} {}", response.status, response.status_text))),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(()) => cached.push(url.to_string()),
                Err(e) => {
                    self.observer.prewarm_failed(url, &e);
                    failed.push(url.to_string());
                }
            }
        }

        tracing::info!(cached = cached.len(), failed = failed.len(), "pre-warmed static partition");
        Ok((cached, failed))
    }

    /// Sweep stale stores, record this version as active and take control.
    ///
    /// On failure the engine goes back to `waiting`, so a later
    /// `SKIP_WAITING` retries the whole activation.
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        match self.activate_if_waiting().await? {
            Some(report) => Ok(report),
            None => Err(Error::InvalidInput(format!("activate while {}", self.state().await))),
        }
    }

    /// `None` when the engine was not waiting, including when a concurrent
    /// caller started activating first.
    async fn activate_if_waiting(&self) -> Result<Option<ActivateReport>, Error> {
        if !self.lifecycle.try_advance(WorkerState::Waiting, WorkerState::Activating).await? {
            return Ok(None);
        }

        let report = match self.run_activation().await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(version = self.version(), error = %e, "activation failed");
                self.lifecycle.abort_activation().await;
                return Err(e);
            }
        };

        self.lifecycle.claim_clients();
        self.lifecycle.advance(WorkerState::Activating, WorkerState::Active).await?;
        tracing::info!(version = self.version(), deleted = report.deleted.len(), purged = report.purged, "activated");
        Ok(Some(report))
    }

    async fn run_activation(&self) -> Result<ActivateReport, Error> {
        let deleted = self.registry.sweep_stale().await?;
        let purged = match self.max_age {
            Some(max_age) => self.registry.purge_expired(max_age).await?,
            None => 0,
        };
        self.registry.db().set_meta(ACTIVE_VERSION_KEY, self.version()).await?;
        Ok(ActivateReport { deleted, purged })
    }

    /// Intercept a request. Only GET requests are handled, and only once active.
    pub async fn handle_fetch(&self, request: &Request) -> FetchDisposition {
        if !request.is_get() || self.state().await != WorkerState::Active {
            return FetchDisposition::Bypass;
        }

        let route = self.classifier.classify(request);
        tracing::debug!(url = %request.url, partition = %route.partition, strategy = %route.strategy, "intercepted");
        let executed = self.executor.execute(request, &route).await;
        FetchDisposition::Handled { route, executed }
    }

    /// Plain network handling for bypassed requests.
    pub async fn passthrough(&self, request: &Request) -> Result<Response, Error> {
        self.fetcher.fetch(request).await
    }

    pub async fn handle_message(&self, message: &Message) -> Result<Option<Reply>, Error> {
        tracing::debug!(kind = message.kind(), "message received");
        match message {
            Message::SkipWaiting => self.on_skip_waiting().await,
            Message::ClearCache => self.on_clear_cache().await,
            Message::GetCacheSize => self.on_get_cache_size().await,
            Message::StoreLocation { payload } => self.on_store_location(payload).await,
            Message::TrackingStarted => self.on_tracking(true),
            Message::TrackingStopped => self.on_tracking(false),
        }
    }

    async fn on_skip_waiting(&self) -> Result<Option<Reply>, Error> {
        if self.activate_if_waiting().await?.is_none() {
            let state = self.state().await;
            tracing::debug!(state = %state, "SKIP_WAITING ignored");
        }
        Ok(None)
    }

    async fn on_clear_cache(&self) -> Result<Option<Reply>, Error> {
        let cancelled = self.executor.cancel_revalidations();
        let deleted = self.registry.delete_all().await?;
        tracing::info!(deleted, cancelled, "cleared all cache stores");
        Ok(Some(Reply::Cleared { success: true }))
    }

    async fn on_get_cache_size(&self) -> Result<Option<Reply>, Error> {
        let size = self.registry.total_size().await?;
        Ok(Some(Reply::CacheSize { size }))
    }

    async fn on_store_location(&self, location: &Location) -> Result<Option<Reply>, Error> {
        self.registry.store_location(location).await?;
        tracing::debug!(latitude = location.latitude, longitude = location.longitude, "location stored");
        Ok(None)
    }

    fn on_tracking(&self, started: bool) -> Result<Option<Reply>, Error> {
        self.tracking.store(started, Ordering::SeqCst);
        tracing::info!(started, "location tracking");
        Ok(None)
    }

    /// Background sync. Returns whether the tag is one the engine handles.
    ///
    /// Location sync only reads the stored position; there is no upload
    /// endpoint to push it to yet.
    pub async fn handle_sync(&self, tag: &str) -> Result<bool, Error> {
        if !SYNC_TAGS.contains(&tag) {
            tracing::debug!(tag, "unknown sync tag ignored");
            return Ok(false);
        }

        match self.registry.load_location().await? {
            Some(location) => tracing::info!(tag, latitude = location.latitude, longitude = location.longitude, "sync"),
            None => tracing::info!(tag, "sync without stored location"),
        }
        Ok(true)
    }

    pub fn handle_push(&self, payload: Option<&[u8]>) -> Notification {
        Notification::from_push(payload)
    }

    pub fn handle_notification_click(&self, windows: &[ClientWindow]) -> ClickAction {
        resolve_click(windows, &self.scope)
    }

    pub async fn status(&self) -> Result<EngineStatus, Error> {
        Ok(EngineStatus {
            state: self.state().await,
            version: self.version().to_string(),
            active_version: self.registry.db().get_meta(ACTIVE_VERSION_KEY).await?,
            controlling: self.lifecycle.controls_clients(),
            tracking: self.tracking.load(Ordering::SeqCst),
            partitions: self.registry.partition_stats().await?,
            total_size: self.registry.total_size().await?,
        })
    }
}
