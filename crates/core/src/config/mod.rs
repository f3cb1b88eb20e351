//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SIGCACHE_*)
//! 2. TOML config file (if SIGCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::{Partition, Strategy};

mod validation;

pub use validation::ConfigError;

/// Strategy assigned to each partition.
///
/// Set via SIGCACHE_STRATEGIES__<PARTITION> (e.g. `SIGCACHE_STRATEGIES__TILES=network-first`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyTable {
    #[serde(rename = "static", default = "cache_first")]
    pub static_assets: Strategy,
    #[serde(default = "cache_first")]
    pub tiles: Strategy,
    #[serde(default = "stale_while_revalidate")]
    pub data: Strategy,
    #[serde(default = "network_first")]
    pub runtime: Strategy,
    #[serde(default = "cache_first")]
    pub images: Strategy,
}

fn cache_first() -> Strategy {
    Strategy::CacheFirst
}

fn network_first() -> Strategy {
    Strategy::NetworkFirst
}

fn stale_while_revalidate() -> Strategy {
    Strategy::StaleWhileRevalidate
}

impl Default for StrategyTable {
    fn default() -> Self {
        Self {
            static_assets: Strategy::CacheFirst,
            tiles: Strategy::CacheFirst,
            data: Strategy::StaleWhileRevalidate,
            runtime: Strategy::NetworkFirst,
            images: Strategy::CacheFirst,
        }
    }
}

impl StrategyTable {
    pub fn get(&self, partition: Partition) -> Strategy {
        match partition {
            Partition::Static => self.static_assets,
            Partition::Tiles => self.tiles,
            Partition::Data => self.data,
            Partition::Runtime => self.runtime,
            Partition::Images => self.images,
        }
    }
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SIGCACHE_*)
/// 2. TOML config file (if SIGCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Cache schema generation. Bumping it invalidates every partition.
    ///
    /// Set via SIGCACHE_VERSION environment variable.
    #[serde(default = "default_version")]
    pub version: String,

    /// Prefix shared by every version; names the reserved locations store.
    ///
    /// Set via SIGCACHE_CACHE_PREFIX environment variable.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Path to SQLite cache database.
    ///
    /// Set via SIGCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Origin the application is served from; requests to it are same-origin.
    ///
    /// Set via SIGCACHE_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Scope path of the application under the origin.
    ///
    /// Set via SIGCACHE_BASE_PATH environment variable.
    #[serde(default = "default_base_path")]
    pub base_path: String,

    /// Paths (relative to the base path) pre-fetched into the static
    /// partition during install.
    #[serde(default = "default_critical_assets")]
    pub critical_assets: Vec<String>,

    /// Regex patterns matched against the hostname of tile servers.
    #[serde(default = "default_tile_hosts")]
    pub tile_hosts: Vec<String>,

    /// Abort timeout for tile network fetches in milliseconds.
    ///
    /// Set via SIGCACHE_TILE_TIMEOUT_MS environment variable.
    #[serde(default = "default_tile_timeout_ms")]
    pub tile_timeout_ms: Option<u64>,

    /// Whether non-tile images get their own partition.
    ///
    /// Set via SIGCACHE_IMAGES_PARTITION environment variable.
    #[serde(default = "default_true")]
    pub images_partition: bool,

    /// Activate a freshly installed version without waiting for SKIP_WAITING.
    ///
    /// Set via SIGCACHE_SKIP_WAITING_ON_INSTALL environment variable.
    #[serde(default)]
    pub skip_waiting_on_install: bool,

    /// Strategy per partition.
    #[serde(default)]
    pub strategies: StrategyTable,

    /// Maximum age of a cached entry in seconds. Unset means entries live
    /// until the next version sweep.
    ///
    /// Set via SIGCACHE_ENTRY_MAX_AGE_SECS environment variable.
    #[serde(default)]
    pub entry_max_age_secs: Option<u64>,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via SIGCACHE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Transport timeout for non-tile requests in milliseconds.
    ///
    /// Set via SIGCACHE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via SIGCACHE_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

fn default_version() -> String {
    "sig-senegal-v3".into()
}

fn default_cache_prefix() -> String {
    "sig-senegal".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./sig-offline-cache.sqlite")
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_base_path() -> String {
    "/".into()
}

fn default_critical_assets() -> Vec<String> {
    [
        "",
        "index.html",
        "manifest.json",
        "css/leaflet.css",
        "css/mobile-pro.css",
        "js/leaflet.js",
        "js/leaflet.markercluster.js",
        "js/geolocation.js",
        "js/pwa.js",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_tile_hosts() -> Vec<String> {
    [
        r"tile\.openstreetmap\.org",
        r"server\.arcgisonline\.com",
        r"tile\.opentopomap\.org",
        r"basemaps\.cartocdn\.com",
        r"api\.mapbox\.com",
        r"tiles\.mapbox\.com",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_tile_timeout_ms() -> Option<u64> {
    Some(5_000)
}

fn default_user_agent() -> String {
    "sig-offline/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    10_485_760 // 10MB
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            cache_prefix: default_cache_prefix(),
            db_path: default_db_path(),
            origin: default_origin(),
            base_path: default_base_path(),
            critical_assets: default_critical_assets(),
            tile_hosts: default_tile_hosts(),
            tile_timeout_ms: default_tile_timeout_ms(),
            images_partition: true,
            skip_waiting_on_install: false,
            strategies: StrategyTable::default(),
            entry_max_age_secs: None,
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn tile_timeout(&self) -> Option<Duration> {
        self.tile_timeout_ms.map(Duration::from_millis)
    }

    pub fn entry_max_age(&self) -> Option<Duration> {
        self.entry_max_age_secs.map(Duration::from_secs)
    }

    /// Parsed origin URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the origin is not an http(s) URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(ConfigError::Invalid { field: "origin".into(), reason: format!("unsupported scheme {scheme}") }),
        }
    }

    /// Origin joined with the base path: the root of the application scope.
    pub fn scope_url(&self) -> Result<Url, ConfigError> {
        self.origin_url()?
            .join(&self.base_path)
            .map_err(|e| ConfigError::Invalid { field: "base_path".into(), reason: e.to_string() })
    }

    /// Absolute URLs of the critical assets, in manifest order.
    pub fn critical_asset_urls(&self) -> Result<Vec<Url>, ConfigError> {
        let scope = self.scope_url()?;
        self.critical_assets
            .iter()
            .map(|asset| {
                scope
                    .join(asset.trim_start_matches('/'))
                    .map_err(|e| ConfigError::Invalid { field: "critical_assets".into(), reason: format!("{asset}: {e}") })
            })
            .collect()
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SIGCACHE_`
    /// 2. TOML file from `SIGCACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SIGCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SIGCACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        Self::from_figment(figment)
    }

    /// Extract and validate a configuration from an already layered figment.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
