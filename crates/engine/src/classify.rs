//! Request classification.
//!
//! Maps a GET request to a resource class, the partition it is stored in
//! and the strategy used to serve it. Classification is pure and total:
//! every request lands somewhere, `runtime` being the catch-all.
//!
//! Rules, first match wins:
//! 1. tile: tile-server host with an image path, or a `/{z}/{x}/{y}.ext` path
//! 2. geodata: `/data/` segment or `.geojson` suffix
//! 3. image: image extension or image destination
//! 4. static: same-origin shell files (html/css/js, scope root, critical assets)
//! 5. runtime: everything else

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::{Regex, RegexSet};
use serde::{Deserialize, Serialize};
use sigcache_core::{AppConfig, Destination, Error, Partition, Request, Strategy, StrategyTable};
use url::Url;

static TILE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)/\d+/\d+/\d+(@2x)?\.(png|jpe?g|webp)$").expect("tile path pattern is valid")
});

const TILE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "svg", "gif"];
const SHELL_EXTENSIONS: &[&str] = &["html", "css", "js"];

/// What kind of resource a request fetches. Drives fallback selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResourceClass {
    Tile,
    Geodata,
    Image,
    Static,
    Runtime,
}

/// Classification result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Route {
    pub class: ResourceClass,
    pub partition: Partition,
    pub strategy: Strategy,
}

#[derive(Debug, Clone)]
pub struct Classifier {
    tile_hosts: RegexSet,
    origin: Url,
    base_path: String,
    critical_paths: HashSet<String>,
    images_partition: bool,
    strategies: StrategyTable,
}

impl Classifier {
    /// Build a classifier from configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPattern` if a tile host pattern does not compile
    /// and `Error::InvalidUrl` if the origin or critical assets do not parse.
    pub fn new(config: &AppConfig) -> Result<Self, Error> {
        let tile_hosts = RegexSet::new(&config.tile_hosts).map_err(|e| Error::InvalidPattern(e.to_string()))?;
        let origin = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let critical_paths = config
            .critical_asset_urls()
            .map_err(|e| Error::InvalidUrl(e.to_string()))?
            .into_iter()
            .map(|url| url.path().to_string())
            .collect();

        Ok(Self {
            tile_hosts,
            origin,
            base_path: config.base_path.clone(),
            critical_paths,
            images_partition: config.images_partition,
            strategies: config.strategies,
        })
    }

    /// Classify a request. Callers bypass non-GET requests before this point.
    pub fn classify(&self, request: &Request) -> Route {
        let (class, partition) = self.partition_for(request);
        Route { class, partition, strategy: self.strategies.get(partition) }
    }

    fn partition_for(&self, request: &Request) -> (ResourceClass, Partition) {
        let url = &request.url;
        let path = url.path();
        let ext = extension(path);
        let image_hint = request.destination == Some(Destination::Image);

        if self.is_tile(url, ext.as_deref(), image_hint) {
            return (ResourceClass::Tile, Partition::Tiles);
        }

        if path.contains("/data/") || ext.as_deref() == Some("geojson") {
            return (ResourceClass::Geodata, Partition::Data);
        }

        let same_origin = url.origin() == self.origin.origin();

        if image_hint || ext.as_deref().is_some_and(|e| IMAGE_EXTENSIONS.contains(&e)) {
            let partition = match (self.images_partition, same_origin) {
                (true, _) => Partition::Images,
                (false, true) => Partition::Static,
                (false, false) => Partition::Runtime,
            };
            return (ResourceClass::Image, partition);
        }

        if same_origin && self.is_shell(path, ext.as_deref()) {
            return (ResourceClass::Static, Partition::Static);
        }

        (ResourceClass::Runtime, Partition::Runtime)
    }

    fn is_tile(&self, url: &Url, ext: Option<&str>, image_hint: bool) -> bool {
        let tile_host = url.host_str().is_some_and(|host| self.tile_hosts.is_match(host));
        let image_path = ext.is_some_and(|e| TILE_EXTENSIONS.contains(&e));
        (tile_host && (image_path || image_hint)) || TILE_PATH.is_match(url.path())
    }

    fn is_shell(&self, path: &str, ext: Option<&str>) -> bool {
        ext.is_some_and(|e| SHELL_EXTENSIONS.contains(&e))
            || path == "/"
            || path == self.base_path
            || path.ends_with('/')
            || self.critical_paths.contains(path)
    }
}

/// Lowercased extension of the last path segment.
fn extension(path: &str) -> Option<String> {
    let segment = path.rsplit('/').next()?;
    let (_, ext) = segment.rsplit_once('.')?;
    (!ext.is_empty()).then(|| ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        Classifier::new(&AppConfig::default()).unwrap()
    }

    fn get(url: &str) -> Request {
        Request::get(Url::parse(url).unwrap())
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension("/7/60/30.PNG").as_deref(), Some("png"));
        assert_eq!(extension("/data/Region_1.geojson").as_deref(), Some("geojson"));
        assert_eq!(extension("/v1.2/list"), None);
        assert_eq!(extension("/"), None);
        assert_eq!(extension("/file."), None);
    }

    #[test]
    fn test_tile_hosts_classified_as_tiles() {
        let c = classifier();
        for url in [
            "https://tile.openstreetmap.org/7/60/30.png",
            "https://a.tile.openstreetmap.org/12/1900/1700.png",
            "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/7/30/60.jpg",
            "https://tile.opentopomap.org/5/15/14.png",
            "https://basemaps.cartocdn.com/dark_all/6/31/29.png",
            "https://api.mapbox.com/styles/v1/mapbox/streets-v11/tiles/256/6/31/29@2x.webp",
        ] {
            let route = c.classify(&get(url));
            assert_eq!(route.partition, Partition::Tiles, "{url}");
            assert_eq!(route.class, ResourceClass::Tile, "{url}");
        }
    }

    #[test]
    fn test_tile_host_with_image_destination() {
        let c = classifier();
        let request = get("https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/7/30/60")
            .with_destination(Destination::Image);
        assert_eq!(c.classify(&request).partition, Partition::Tiles);
    }

    #[test]
    fn test_tile_host_non_image_not_tile() {
        let c = classifier();
        let route = c.classify(&get("https://api.mapbox.com/styles/v1/mapbox/streets-v11"));
        assert_eq!(route.partition, Partition::Runtime);
    }

    #[test]
    fn test_generic_zxy_path_is_tile() {
        let c = classifier();
        let route = c.classify(&get("https://tiles.example.org/osm/10/500/400.jpeg"));
        assert_eq!(route.partition, Partition::Tiles);
    }

    #[test]
    fn test_geodata_is_stale_while_revalidate() {
        let c = classifier();
        for url in [
            "http://localhost:8080/data/Region_1.geojson",
            "http://localhost:8080/data/Departement_2.json",
            "https://cdn.example.org/data/localites_5.json",
            "http://localhost:8080/layers/Routes_4.geojson",
        ] {
            let route = c.classify(&get(url));
            assert_eq!(route.partition, Partition::Data, "{url}");
            assert_eq!(route.strategy, Strategy::StaleWhileRevalidate, "{url}");
        }
    }

    #[test]
    fn test_images_partition() {
        let c = classifier();
        let route = c.classify(&get("http://localhost:8080/img/legend.svg"));
        assert_eq!(route, Route { class: ResourceClass::Image, partition: Partition::Images, strategy: Strategy::CacheFirst });

        let route = c.classify(&get("https://unpkg.com/leaflet/dist/images/marker-icon.png"));
        assert_eq!(route.partition, Partition::Images);
    }

    #[test]
    fn test_images_without_partition() {
        let config = AppConfig { images_partition: false, ..Default::default() };
        let c = Classifier::new(&config).unwrap();

        let local = c.classify(&get("http://localhost:8080/img/legend.png"));
        assert_eq!((local.class, local.partition), (ResourceClass::Image, Partition::Static));

        let remote = c.classify(&get("https://unpkg.com/leaflet/dist/images/marker-icon.png"));
        assert_eq!((remote.class, remote.partition), (ResourceClass::Image, Partition::Runtime));
    }

    #[test]
    fn test_static_assets() {
        let c = classifier();
        for url in [
            "http://localhost:8080/",
            "http://localhost:8080/index.html",
            "http://localhost:8080/css/leaflet.css",
            "http://localhost:8080/js/pwa.js",
            "http://localhost:8080/manifest.json",
        ] {
            let route = c.classify(&get(url));
            assert_eq!(route.partition, Partition::Static, "{url}");
            assert_eq!(route.strategy, Strategy::CacheFirst, "{url}");
        }
    }

    #[test]
    fn test_static_under_base_path() {
        let config = AppConfig { base_path: "/sig-senegal_cmwd/".into(), ..Default::default() };
        let c = Classifier::new(&config).unwrap();
        assert_eq!(c.classify(&get("http://localhost:8080/sig-senegal_cmwd/")).partition, Partition::Static);
        assert_eq!(
            c.classify(&get("http://localhost:8080/sig-senegal_cmwd/manifest.json")).partition,
            Partition::Static
        );
    }

    #[test]
    fn test_cross_origin_scripts_are_runtime() {
        let c = classifier();
        let route = c.classify(&get("https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"));
        assert_eq!(route.partition, Partition::Runtime);
        assert_eq!(route.strategy, Strategy::NetworkFirst);
    }

    #[test]
    fn test_default_runtime() {
        let c = classifier();
        for url in [
            "https://fonts.gstatic.com/s/inter/v12/font.woff2",
            "https://api.example.com/v1/search?q=dakar",
            "http://localhost:8080/api/status",
        ] {
            let route = c.classify(&get(url));
            assert_eq!(route.class, ResourceClass::Runtime, "{url}");
            assert_eq!(route.partition, Partition::Runtime, "{url}");
        }
    }

    #[test]
    fn test_strategy_override() {
        let mut config = AppConfig::default();
        config.strategies.tiles = Strategy::NetworkFirst;
        let c = Classifier::new(&config).unwrap();
        let route = c.classify(&get("https://tile.openstreetmap.org/7/60/30.png"));
        assert_eq!(route.strategy, Strategy::NetworkFirst);
    }

    #[test]
    fn test_classification_deterministic() {
        let c = classifier();
        let request = get("https://tile.openstreetmap.org/7/60/30.png");
        assert_eq!(c.classify(&request), c.classify(&request));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let config = AppConfig { tile_hosts: vec!["(".into()], ..Default::default() };
        assert!(matches!(Classifier::new(&config), Err(Error::InvalidPattern(_))));
    }
}
