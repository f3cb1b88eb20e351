//! Named stores, the equivalent of the browser's `CacheStorage`.
//!
//! A store is created on open (or on first write) and deleted as a whole;
//! its entries cascade with it.

use super::connection::CacheDb;
use super::entries::{CachedEntry, timestamp};
use super::hash::compute_cache_key;
use crate::http::{Request, Response};
use crate::Error;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;

/// Entry count and body bytes of one store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct StoreStats {
    pub entries: u64,
    pub bytes: u64,
}

impl CacheDb {
    /// Open (creating if absent) the store called `name`.
    pub async fn open_store(&self, name: &str) -> Result<Store, Error> {
        let owned = name.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO stores (name, created_at) VALUES (?1, ?2)",
                    params![owned, timestamp(Utc::now())],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(Store { db: self.clone(), name: name.to_string() })
    }

    /// Handle to the store called `name` without creating it. The store
    /// comes into existence on its first write.
    pub fn store(&self, name: &str) -> Store {
        Store { db: self.clone(), name: name.to_string() }
    }

    /// Names of every existing store, sorted.
    pub async fn store_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM stores ORDER BY name")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn has_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM stores WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a store and all of its entries. Returns whether it existed.
    pub async fn delete_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                conn.execute("DELETE FROM entries WHERE store_name = ?1", params![&name])?;
                let count = conn.execute("DELETE FROM stores WHERE name = ?1", params![&name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Sum of stored body bytes across every store.
    ///
    /// Walks every entry; meant for diagnostics, not the request path.
    pub async fn total_body_bytes(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let total: i64 =
                    conn.query_row("SELECT COALESCE(SUM(LENGTH(body)), 0) FROM entries", [], |row| row.get(0))?;
                Ok(total as u64)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn store_stats(&self, name: &str) -> Result<StoreStats, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<StoreStats, Error> {
                let (entries, bytes): (i64, i64) = conn.query_row(
                    "SELECT COUNT(*), COALESCE(SUM(LENGTH(body)), 0) FROM entries WHERE store_name = ?1",
                    params![name],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?;
                Ok(StoreStats { entries: entries as u64, bytes: bytes as u64 })
            })
            .await
            .map_err(Error::from)
    }
}

/// Handle to one named store.
#[derive(Debug, Clone)]
pub struct Store {
    db: CacheDb,
    name: String,
}

impl Store {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up the entry stored for `request`.
    pub async fn match_request(&self, request: &Request) -> Result<Option<CachedEntry>, Error> {
        let key = compute_cache_key(&request.method, &request.url);
        self.db.get_entry(&self.name, &key).await
    }

    /// Store a snapshot of `response` for `request`.
    pub async fn put(&self, request: &Request, response: &Response) -> Result<(), Error> {
        self.db.put_entry(&CachedEntry::new(&self.name, request, response)).await
    }

    pub async fn delete(&self, request: &Request) -> Result<bool, Error> {
        let key = compute_cache_key(&request.method, &request.url);
        self.db.delete_entry(&self.name, &key).await
    }

    pub async fn stats(&self) -> Result<StoreStats, Error> {
        self.db.store_stats(&self.name).await
    }

    /// Number of entries in the store.
    pub async fn len(&self) -> Result<u64, Error> {
        Ok(self.stats().await?.entries)
    }
}
