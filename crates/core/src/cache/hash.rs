//! Cache key generation.

use sha2::{Digest, Sha256};
use url::Url;

/// The URL an entry is stored under: `url` without its fragment.
pub fn canonical_url(url: &Url) -> Url {
    let mut canonical = url.clone();
    canonical.set_fragment(None);
    canonical
}

/// Compute the key of a cached entry from the request method and its
/// canonical URL.
pub fn compute_cache_key(method: &str, url: &Url) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(canonical_url(url).as_str().as_bytes());
    hex::encode(hasher.finalize())
}
