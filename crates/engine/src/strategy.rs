//! Caching strategies.
//!
//! ### Guarantees
//! - [`StrategyExecutor::execute`] always produces a response: network,
//!   cache or fallback, in that order of preference per strategy.
//! - Only cacheable responses are written. Non-cacheable ones (404, opaque)
//!   pass through untouched.
//! - A failed cache write is reported and the response is still returned.
//!
//! ### Expiry
//! When an entry max age is configured, an older entry counts as a miss but
//! is still served if the network fails.
//!
//! ### Revalidation
//! Background refreshes are tracked so [`StrategyExecutor::cancel_revalidations`]
//! can stop them before the stores they write to are cleared.
//!
//! ### Tiles
//! Tile fetches send an image `Accept` header and are bounded by the tile
//! timeout under every strategy. On timeout the in-flight fetch is dropped.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sigcache_core::{Error, Request, Response, Store, Strategy};
use tokio::task::{AbortHandle, JoinHandle};

use crate::classify::{ResourceClass, Route};
use crate::fallback::FallbackProvider;
use crate::fetch::Fetcher;
use crate::observer::Observer;
use crate::registry::PartitionRegistry;

pub const TILE_ACCEPT: &str = "image/webp,image/png,image/*;q=0.8";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Cache,
    Network,
    Fallback,
}

/// Outcome of a strategy run.
#[derive(Debug)]
pub struct Executed {
    pub response: Response,
    pub source: ResponseSource,
    /// Background refresh spawned by stale-while-revalidate on a cache hit.
    pub revalidation: Option<JoinHandle<()>>,
}

impl Executed {
    fn new(response: Response, source: ResponseSource) -> Self {
        Self { response, source, revalidation: None }
    }
}

enum Lookup {
    Fresh(Response),
    Expired(Response),
    Miss,
}

#[derive(Clone)]
pub struct StrategyExecutor {
    registry: PartitionRegistry,
    fetcher: Arc<dyn Fetcher>,
    fallback: FallbackProvider,
    observer: Arc<dyn Observer>,
    tile_timeout: Option<Duration>,
    max_age: Option<Duration>,
    revalidations: Arc<Mutex<Vec<AbortHandle>>>,
}

impl StrategyExecutor {
    pub fn new(
        registry: PartitionRegistry, fetcher: Arc<dyn Fetcher>, fallback: FallbackProvider,
        observer: Arc<dyn Observer>,
    ) -> Self {
        Self {
            registry,
            fetcher,
            fallback,
            observer,
            tile_timeout: None,
            max_age: None,
            revalidations: Arc::default(),
        }
    }

    pub fn with_tile_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.tile_timeout = timeout;
        self
    }

    pub fn with_max_age(mut self, max_age: Option<Duration>) -> Self {
        self.max_age = max_age;
        self
    }

    /// Serve `request` according to `route`.
    pub async fn execute(&self, request: &Request, route: &Route) -> Executed {
        let request = prepare(request, route);
        let store = self.registry.store(route.partition);

        match route.strategy {
            Strategy::CacheFirst => self.cache_first(&request, route, &store).await,
            Strategy::NetworkFirst => self.network_first(&request, route, &store).await,
            Strategy::StaleWhileRevalidate => self.stale_while_revalidate(&request, route, &store).await,
        }
    }

    async fn cache_first(&self, request: &Request, route: &Route, store: &Store) -> Executed {
        let expired = match self.lookup(store, request).await {
            Lookup::Fresh(response) => {
                tracing::debug!(url = %request.url, store = store.name(), "cache hit");
                return Executed::new(response, ResponseSource::Cache);
            }
            Lookup::Expired(response) => Some(response),
            Lookup::Miss => None,
        };

        self.fetch_or_fall_back(request, route, store, expired).await
    }

    async fn network_first(&self, request: &Request, route: &Route, store: &Store) -> Executed {
        match self.fetch_network(request, route).await {
            Ok(response) => {
                self.remember(store, request, &response).await;
                Executed::new(response, ResponseSource::Network)
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "network failed, trying cache");
                match self.lookup(store, request).await {
                    Lookup::Fresh(response) | Lookup::Expired(response) => {
                        Executed::new(response, ResponseSource::Cache)
                    }
                    Lookup::Miss => self.fall_back(request, route).await,
                }
            }
        }
    }

    async fn stale_while_revalidate(&self, request: &Request, route: &Route, store: &Store) -> Executed {
        let expired = match self.lookup(store, request).await {
            Lookup::Fresh(response) => {
                let revalidation = self.spawn_revalidation(request.clone(), *route, store.clone());
                return Executed { response, source: ResponseSource::Cache, revalidation: Some(revalidation) };
            }
            Lookup::Expired(response) => Some(response),
            Lookup::Miss => None,
        };

        self.fetch_or_fall_back(request, route, store, expired).await
    }

    async fn fetch_or_fall_back(
        &self, request: &Request, route: &Route, store: &Store, expired: Option<Response>,
    ) -> Executed {
        match self.fetch_network(request, route).await {
            Ok(response) => {
                self.remember(store, request, &response).await;
                Executed::new(response, ResponseSource::Network)
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "network failed");
                match expired {
                    Some(response) => Executed::new(response, ResponseSource::Cache),
                    None => self.fall_back(request, route).await,
                }
            }
        }
    }

    fn spawn_revalidation(&self, request: Request, route: Route, store: Store) -> JoinHandle<()> {
        let this = self.clone();
        let handle = tokio::spawn(async move {
            match this.fetch_network(&request, &route).await {
                Ok(response) => this.remember(&store, &request, &response).await,
                Err(e) => this.observer.revalidation_failed(&request.url, &e),
            }
        });

        let mut pending = self.revalidations.lock().unwrap_or_else(PoisonError::into_inner);
        pending.retain(|task| !task.is_finished());
        pending.push(handle.abort_handle());
        handle
    }

    /// Abort every background refresh still in flight. Returns how many
    /// were stopped.
    pub fn cancel_revalidations(&self) -> usize {
        let pending = std::mem::take(&mut *self.revalidations.lock().unwrap_or_else(PoisonError::into_inner));
        let mut cancelled = 0;
        for task in pending.into_iter().filter(|task| !task.is_finished()) {
            task.abort();
            cancelled += 1;
        }
        cancelled
    }

    async fn fetch_network(&self, request: &Request, route: &Route) -> Result<Response, Error> {
        match (route.class, self.tile_timeout) {
            (ResourceClass::Tile, Some(limit)) => tokio::time::timeout(limit, self.fetcher.fetch(request))
                .await
                .map_err(|_| Error::FetchTimeout(format!("tile {} exceeded {}ms", request.url, limit.as_millis())))?,
            _ => self.fetcher.fetch(request).await,
        }
    }

    async fn lookup(&self, store: &Store, request: &Request) -> Lookup {
        match store.match_request(request).await {
            Ok(Some(entry)) => {
                let expired = match (self.max_age, entry.age(Utc::now())) {
                    (Some(max_age), Some(age)) => age.to_std().is_ok_and(|age| age > max_age),
                    _ => false,
                };
                if expired { Lookup::Expired(entry.to_response()) } else { Lookup::Fresh(entry.to_response()) }
            }
            Ok(None) => Lookup::Miss,
            Err(e) => {
                self.observer.cache_read_failed(store.name(), &request.url, &e);
                Lookup::Miss
            }
        }
    }

    /// Store a copy of `response` if it is cacheable.
    async fn remember(&self, store: &Store, request: &Request, response: &Response) {
        if !response.is_cacheable() {
            return;
        }
        if let Err(e) = store.put(request, response).await {
            self.observer.cache_write_failed(store.name(), &request.url, &e);
        }
    }

    async fn fall_back(&self, request: &Request, route: &Route) -> Executed {
        let response = self.fallback.fallback_for(route.class, request).await;
        Executed::new(response, ResponseSource::Fallback)
    }
}

fn prepare(request: &Request, route: &Route) -> Request {
    let request = request.clone();
    if route.class == ResourceClass::Tile { request.with_header("accept", TILE_ACCEPT) } else { request }
}
