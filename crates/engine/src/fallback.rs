//! Synthetic responses for requests that can be served neither from the
//! network nor from the cache.

use serde_json::json;
use sigcache_core::{AppConfig, Error, Partition, Request, Response};
use url::Url;

use crate::classify::ResourceClass;
use crate::registry::PartitionRegistry;

const TILE_PLACEHOLDER: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="256" height="256" viewBox="0 0 256 256"><rect fill="#e5e7eb" width="256" height="256"/><text x="128" y="128" font-family="sans-serif" font-size="16" text-anchor="middle" fill="#9ca3af" dy=".3em">Hors ligne</text></svg>"##;

const OFFLINE_PAGE: &str = "<!DOCTYPE html><html lang=\"fr\"><head><meta charset=\"utf-8\"><title>Hors ligne</title></head>\
<body><h1>Hors ligne</h1><p>Vérifiez votre connexion.</p></body></html>";

#[derive(Debug, Clone)]
pub struct FallbackProvider {
    registry: PartitionRegistry,
    shell: Request,
}

impl FallbackProvider {
    pub fn new(registry: PartitionRegistry, config: &AppConfig) -> Result<Self, Error> {
        let scope = config.scope_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let shell = scope.join("index.html").map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self { registry, shell: Request::get(shell) })
    }

    /// Offline response for `request`. Never fails.
    pub async fn fallback_for(&self, class: ResourceClass, request: &Request) -> Response {
        if class == ResourceClass::Tile {
            return tile_placeholder();
        }

        if request.is_navigation() {
            return match self.cached_shell().await {
                Some(shell) => shell,
                None => offline_page(),
            };
        }

        offline_json(&request.url)
    }

    async fn cached_shell(&self) -> Option<Response> {
        match self.registry.store(Partition::Static).match_request(&self.shell).await {
            Ok(entry) => entry.map(|e| e.to_response()),
            Err(e) => {
                tracing::debug!(error = %e, "app shell lookup failed");
                None
            }
        }
    }
}

/// Neutral 256×256 tile drawn in place of a missing map tile.
pub fn tile_placeholder() -> Response {
    Response::ok("image/svg+xml", TILE_PLACEHOLDER)
}

pub fn offline_page() -> Response {
    Response::with_status(503, "Service Unavailable", "text/html; charset=utf-8", OFFLINE_PAGE)
}

pub fn offline_json(url: &Url) -> Response {
    let body = json!({ "error": "offline", "url": url.as_str() }).to_string();
    Response::with_status(503, "Service Unavailable", "application/json", body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigcache_core::{CacheDb, Destination};

    async fn provider() -> FallbackProvider {
        let config = AppConfig::default();
        let registry = PartitionRegistry::new(CacheDb::open_in_memory().await.unwrap(), &config).unwrap();
        FallbackProvider::new(registry, &config).unwrap()
    }

    fn get(url: &str) -> Request {
        Request::get(Url::parse(url).unwrap())
    }

    #[tokio::test]
    async fn test_tile_placeholder() {
        let p = provider().await;
        let response = p.fallback_for(ResourceClass::Tile, &get("https://tile.openstreetmap.org/7/60/30.png")).await;
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type(), Some("image/svg+xml"));
        let body = std::str::from_utf8(&response.body).unwrap();
        assert!(body.contains(r#"width="256""#));
        assert!(body.contains("Hors ligne"));
    }

    #[tokio::test]
    async fn test_navigation_offline_page() {
        let p = provider().await;
        let request = get("http://localhost:8080/carte").with_destination(Destination::Document);
        let response = p.fallback_for(ResourceClass::Runtime, &request).await;
        assert_eq!(response.status, 503);
        assert_eq!(response.status_text, "Service Unavailable");
        assert!(response.content_type().unwrap().starts_with("text/html"));
    }

    #[tokio::test]
    async fn test_navigation_prefers_cached_shell() {
        let p = provider().await;
        let shell = Response::ok("text/html", "<html>app shell</html>");
        p.registry.store(Partition::Static).put(&get("http://localhost:8080/index.html"), &shell).await.unwrap();

        let request = get("http://localhost:8080/").with_header("accept", "text/html,application/xhtml+xml");
        let response = p.fallback_for(ResourceClass::Static, &request).await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body, shell.body);
    }

    #[tokio::test]
    async fn test_other_requests_get_json() {
        let p = provider().await;
        let response = p.fallback_for(ResourceClass::Geodata, &get("http://localhost:8080/data/Region_1.geojson")).await;
        assert_eq!(response.status, 503);
        assert_eq!(response.content_type(), Some("application/json"));

        let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(body["error"], "offline");
        assert_eq!(body["url"], "http://localhost:8080/data/Region_1.geojson");
    }
}
