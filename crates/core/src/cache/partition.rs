//! Logical cache partitions and caching strategies.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named cache bucket. The storage identifier of a partition is
/// version-qualified, see [`Partition::storage_id`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    Static,
    Tiles,
    Data,
    Runtime,
    Images,
}

impl Partition {
    pub const ALL: [Partition; 5] =
        [Partition::Static, Partition::Tiles, Partition::Data, Partition::Runtime, Partition::Images];

    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Static => "static",
            Partition::Tiles => "tiles",
            Partition::Data => "data",
            Partition::Runtime => "runtime",
            Partition::Images => "images",
        }
    }

    /// `{version}-{partition}`, e.g. `sig-senegal-v3-tiles`.
    pub fn storage_id(&self, version: &str) -> String {
        format!("{version}-{}", self.as_str())
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caching algorithm applied to a classified request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    CacheFirst,
    NetworkFirst,
    StaleWhileRevalidate,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::CacheFirst => "cache-first",
            Strategy::NetworkFirst => "network-first",
            Strategy::StaleWhileRevalidate => "stale-while-revalidate",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_id() {
        assert_eq!(Partition::Tiles.storage_id("sig-senegal-v3"), "sig-senegal-v3-tiles");
        assert_eq!(Partition::Static.storage_id("v9"), "v9-static");
    }

    #[test]
    fn test_strategy_serde_names() {
        let json = serde_json::to_string(&Strategy::StaleWhileRevalidate).unwrap();
        assert_eq!(json, "\"stale-while-revalidate\"");
        let parsed: Strategy = serde_json::from_str("\"network-first\"").unwrap();
        assert_eq!(parsed, Strategy::NetworkFirst);
    }

    #[test]
    fn test_partition_display_matches_serde() {
        for partition in Partition::ALL {
            let json = serde_json::to_string(&partition).unwrap();
            assert_eq!(json, format!("\"{partition}\""));
        }
    }
}
