//! Version-qualified cache partitions.
//!
//! Every partition lives in the store `{version}-{partition}`. The current
//! set is those ids plus the reserved locations store, which survives
//! version bumps and is only removed by a full clear.

use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sigcache_core::cache::StoreStats;
use sigcache_core::{AppConfig, CacheDb, Error, Partition, Request, Response, Store};
use url::Url;

use crate::message::Location;

/// Usage of one partition's current store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PartitionUsage {
    pub partition: Partition,
    pub store: String,
    #[serde(flatten)]
    pub stats: StoreStats,
}

#[derive(Debug, Clone)]
pub struct PartitionRegistry {
    db: CacheDb,
    version: String,
    prefix: String,
    images_enabled: bool,
    location_key: Url,
}

impl PartitionRegistry {
    pub fn new(db: CacheDb, config: &AppConfig) -> Result<Self, Error> {
        let scope = config.scope_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let location_key = scope.join("current-location").map_err(|e| Error::InvalidUrl(e.to_string()))?;

        Ok(Self {
            db,
            version: config.version.clone(),
            prefix: config.cache_prefix.clone(),
            images_enabled: config.images_partition,
            location_key,
        })
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Partitions in use under the current configuration.
    pub fn partitions(&self) -> Vec<Partition> {
        Partition::ALL
            .into_iter()
            .filter(|p| self.images_enabled || *p != Partition::Images)
            .collect()
    }

    pub fn storage_id(&self, partition: Partition) -> String {
        partition.storage_id(&self.version)
    }

    pub fn location_store_id(&self) -> String {
        format!("{}-locations", self.prefix)
    }

    /// Store names that belong to the running version.
    pub fn current_set(&self) -> Vec<String> {
        let mut names: Vec<String> = self.partitions().into_iter().map(|p| self.storage_id(p)).collect();
        names.push(self.location_store_id());
        names
    }

    /// Handle to a partition's store; created on first write.
    pub fn store(&self, partition: Partition) -> Store {
        self.db.store(&self.storage_id(partition))
    }

    pub async fn open(&self, partition: Partition) -> Result<Store, Error> {
        self.db.open_store(&self.storage_id(partition)).await
    }

    /// Open (creating if absent) every enabled partition.
    pub async fn open_all(&self) -> Result<Vec<Store>, Error> {
        let mut stores = Vec::new();
        for partition in self.partitions() {
            stores.push(self.open(partition).await?);
        }
        Ok(stores)
    }

    /// Delete every store outside the current set. Returns the deleted names.
    pub async fn sweep_stale(&self) -> Result<Vec<String>, Error> {
        let current = self.current_set();
        let mut deleted = Vec::new();

        for name in self.db.store_names().await? {
            if current.contains(&name) {
                continue;
            }
            if self.db.delete_store(&name).await? {
                tracing::info!(store = %name, "deleted stale cache store");
                deleted.push(name);
            }
        }

        Ok(deleted)
    }

    /// Delete every store, current ones included. Returns how many existed.
    pub async fn delete_all(&self) -> Result<usize, Error> {
        let mut count = 0;
        for name in self.db.store_names().await? {
            if self.db.delete_store(&name).await? {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Body bytes across every store. Walks all entries.
    pub async fn total_size(&self) -> Result<u64, Error> {
        self.db.total_body_bytes().await
    }

    pub async fn partition_stats(&self) -> Result<Vec<PartitionUsage>, Error> {
        let mut usage = Vec::new();
        for partition in self.partitions() {
            let store = self.storage_id(partition);
            let stats = self.db.store_stats(&store).await?;
            usage.push(PartitionUsage { partition, store, stats });
        }
        Ok(usage)
    }

    pub async fn store_location(&self, location: &Location) -> Result<(), Error> {
        let body = serde_json::to_vec(location).map_err(|e| Error::CorruptEntry(format!("location: {e}")))?;
        let store = self.db.store(&self.location_store_id());
        store
            .put(&Request::get(self.location_key.clone()), &Response::ok("application/json", body))
            .await
    }

    pub async fn load_location(&self) -> Result<Option<Location>, Error> {
        let store = self.db.store(&self.location_store_id());
        match store.match_request(&Request::get(self.location_key.clone())).await? {
            Some(entry) => serde_json::from_slice(&entry.body)
                .map(Some)
                .map_err(|e| Error::CorruptEntry(format!("{}: {e}", entry.url))),
            None => Ok(None),
        }
    }

    /// Delete partition entries stored more than `max_age` ago.
    pub async fn purge_expired(&self, max_age: Duration) -> Result<u64, Error> {
        let max_age = chrono::Duration::from_std(max_age).map_err(|e| Error::InvalidInput(e.to_string()))?;
        let stores: Vec<String> = self.partitions().into_iter().map(|p| self.storage_id(p)).collect();
        let purged = self.db.purge_entries_older_than(&stores, Utc::now() - max_age).await?;
        if purged > 0 {
            tracing::info!(purged, "purged expired cache entries");
        }
        Ok(purged)
    }
}
