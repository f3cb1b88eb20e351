//! Observability hook for failures that never reach a caller.
//!
//! Background revalidation, cache writes and install pre-warm all fail
//! silently from the requester's point of view; they are reported here
//! instead of being swallowed.

use sigcache_core::Error;
use url::Url;

pub trait Observer: Send + Sync {
    /// A successful response could not be written to its store.
    fn cache_write_failed(&self, store: &str, url: &Url, error: &Error);

    /// A cache lookup failed and was treated as a miss.
    fn cache_read_failed(&self, store: &str, url: &Url, error: &Error);

    /// A detached stale-while-revalidate refresh failed.
    fn revalidation_failed(&self, url: &Url, error: &Error);

    /// A critical asset could not be pre-fetched during install.
    fn prewarm_failed(&self, url: &Url, error: &Error);
}

/// Default observer: logs through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn cache_write_failed(&self, store: &str, url: &Url, error: &Error) {
        tracing::warn!(store, %url, %error, "cache write failed");
    }

    fn cache_read_failed(&self, store: &str, url: &Url, error: &Error) {
        tracing::warn!(store, %url, %error, "cache read failed, treating as miss");
    }

    fn revalidation_failed(&self, url: &Url, error: &Error) {
        tracing::warn!(%url, %error, "background revalidation failed");
    }

    fn prewarm_failed(&self, url: &Url, error: &Error) {
        tracing::warn!(%url, %error, "critical asset not cached");
    }
}
