//! Network access for the engine.
//!
//! ### Fetcher seam
//! - Strategies only talk to the network through the [`Fetcher`] trait, so
//!   tests substitute a double and the binary plugs in reqwest.
//! - Like the platform `fetch()`, an HTTP error status is a successful
//!   fetch: only transport failures (offline, DNS, timeout) are errors.
//!
//! ### Limits
//! - Max redirects: 5
//! - Max body bytes: 10MB (configurable)
//! - Transport timeout: 20s (configurable); tile fetches are additionally
//!   bounded by the strategy executor.

pub mod url;

use async_trait::async_trait;
use reqwest::Client;
use sigcache_core::{AppConfig, Error, Request, Response, ResponseKind};
use std::time::{Duration, Instant};

pub use self::url::{UrlError, in_scope, resolve};

/// Network fetch abstraction.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform the request over the network.
    ///
    /// # Errors
    ///
    /// Returns `Error::Network` / `Error::FetchTimeout` on transport failure.
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "sig-offline/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 10MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,

    /// Application origin; responses from it are `basic`, others `cors`.
    pub origin: Option<::url::Url>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "sig-offline/0.1".to_string(),
            max_bytes: 10 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
            origin: None,
        }
    }
}

impl FetchConfig {
    pub fn from_app(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            origin: config.origin_url().ok(),
            ..Default::default()
        }
    }
}

/// reqwest-backed fetcher.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    fn kind_for(&self, url: &::url::Url) -> ResponseKind {
        match &self.config.origin {
            Some(origin) if origin.origin() == url.origin() => ResponseKind::Basic,
            Some(_) => ResponseKind::Cors,
            None => ResponseKind::Basic,
        }
    }
}

fn map_transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() { Error::FetchTimeout(err.to_string()) } else { Error::Network(err.to_string()) }
}

#[async_trait]
impl Fetcher for FetchClient {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| Error::InvalidInput(format!("method {}: {e}", request.method)))?;

        let mut builder = self.http.request(method, request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let response = builder.send().await.map_err(map_transport_error)?;

        let status = response.status();
        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let final_url = response.url().clone();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();

        let body = response.bytes().await.map_err(map_transport_error)?;

        if body.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", body.len(), self.config.max_bytes)));
        }

        tracing::debug!(
            "fetched {} -> {} ({}) in {}ms ({} bytes)",
            request.url,
            final_url,
            status.as_u16(),
            start.elapsed().as_millis(),
            body.len()
        );

        Ok(Response {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
            kind: self.kind_for(&final_url),
        })
    }
}
