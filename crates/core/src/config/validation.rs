//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if `version` or `cache_prefix` is empty,
    /// and `ConfigError::Invalid` if:
    /// - `origin` is not an http(s) URL or `base_path` is not `/`-delimited
    /// - a `tile_hosts` pattern does not compile
    /// - `tile_timeout_ms` is outside 100ms..=60s or `timeout_ms` outside 100ms..=5min
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `entry_max_age_secs` is 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version.trim().is_empty() {
            return Err(ConfigError::Invalid { field: "version".into(), reason: "must not be empty".into() });
        }
        if self.cache_prefix.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "cache_prefix".into(),
                hint: "Set SIGCACHE_CACHE_PREFIX environment variable".into(),
            });
        }

        self.origin_url()?;
        if !self.base_path.starts_with('/') || !self.base_path.ends_with('/') {
            return Err(ConfigError::Invalid {
                field: "base_path".into(),
                reason: "must start and end with '/'".into(),
            });
        }
        self.critical_asset_urls()?;

        for pattern in &self.tile_hosts {
            if let Err(e) = regex::Regex::new(pattern) {
                return Err(ConfigError::Invalid { field: "tile_hosts".into(), reason: format!("{pattern}: {e}") });
            }
        }

        if let Some(ms) = self.tile_timeout_ms
            && !(100..=60_000).contains(&ms)
        {
            return Err(ConfigError::Invalid {
                field: "tile_timeout_ms".into(),
                reason: "must be between 100ms and 60000ms".into(),
            });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if self.entry_max_age_secs == Some(0) {
            return Err(ConfigError::Invalid {
                field: "entry_max_age_secs".into(),
                reason: "must be greater than 0 when set".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if !self.version.starts_with(&self.cache_prefix) {
            tracing::warn!(
                version = %self.version,
                prefix = %self.cache_prefix,
                "version does not start with cache_prefix; partition names will not share the prefix"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid_field(result: Result<(), ConfigError>) -> Option<String> {
        match result {
            Err(ConfigError::Invalid { field, .. }) => Some(field),
            _ => None,
        }
    }

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_version() {
        let config = AppConfig { version: "  ".into(), ..Default::default() };
        assert_eq!(invalid_field(config.validate()).as_deref(), Some("version"));
    }

    #[test]
    fn test_validate_empty_prefix() {
        let config = AppConfig { cache_prefix: String::new(), ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Missing { field, .. }) if field == "cache_prefix"));
    }

    #[test]
    fn test_validate_bad_origin() {
        let config = AppConfig { origin: "not a url".into(), ..Default::default() };
        assert_eq!(invalid_field(config.validate()).as_deref(), Some("origin"));
    }

    #[test]
    fn test_validate_base_path_delimiters() {
        let config = AppConfig { base_path: "/sig-senegal_cmwd".into(), ..Default::default() };
        assert_eq!(invalid_field(config.validate()).as_deref(), Some("base_path"));
    }

    #[test]
    fn test_validate_bad_tile_pattern() {
        let config = AppConfig { tile_hosts: vec!["tile.(openstreetmap".into()], ..Default::default() };
        assert_eq!(invalid_field(config.validate()).as_deref(), Some("tile_hosts"));
    }

    #[test]
    fn test_validate_tile_timeout_bounds() {
        let config = AppConfig { tile_timeout_ms: Some(50), ..Default::default() };
        assert_eq!(invalid_field(config.validate()).as_deref(), Some("tile_timeout_ms"));

        let config = AppConfig { tile_timeout_ms: Some(60_001), ..Default::default() };
        assert_eq!(invalid_field(config.validate()).as_deref(), Some("tile_timeout_ms"));

        let config = AppConfig { tile_timeout_ms: None, ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_timeout_bounds() {
        let config = AppConfig { timeout_ms: 50, ..Default::default() };
        assert_eq!(invalid_field(config.validate()).as_deref(), Some("timeout_ms"));

        let config = AppConfig { timeout_ms: 301_000, ..Default::default() };
        assert_eq!(invalid_field(config.validate()).as_deref(), Some("timeout_ms"));
    }

    #[test]
    fn test_validate_max_bytes() {
        let config = AppConfig { max_bytes: 0, ..Default::default() };
        assert_eq!(invalid_field(config.validate()).as_deref(), Some("max_bytes"));

        let config = AppConfig { max_bytes: 51 * 1024 * 1024, ..Default::default() };
        assert_eq!(invalid_field(config.validate()).as_deref(), Some("max_bytes"));
    }

    #[test]
    fn test_validate_zero_max_age() {
        let config = AppConfig { entry_max_age_secs: Some(0), ..Default::default() };
        assert_eq!(invalid_field(config.validate()).as_deref(), Some("entry_max_age_secs"));

        let config = AppConfig { entry_max_age_secs: Some(86_400), ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config = AppConfig {
            max_bytes: 1,
            timeout_ms: 100,
            tile_timeout_ms: Some(100),
            ..Default::default()
        }; // minimum valid values
        assert!(config.validate().is_ok());
    }
}
