//! Engine bookkeeping stored next to the cache stores.

use super::connection::CacheDb;
use super::entries::timestamp;
use crate::Error;
use chrono::Utc;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Key under which the version of the last activated engine is recorded.
pub const ACTIVE_VERSION_KEY: &str = "active_version";

impl CacheDb {
    pub async fn get_meta(&self, key: &str) -> Result<Option<String>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<String>, Error> {
                let result = conn.query_row("SELECT value FROM engine_meta WHERE key = ?1", params![key], |row| {
                    row.get(0)
                });
                match result {
                    Ok(value) => Ok(Some(value)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    pub async fn set_meta(&self, key: &str, value: &str) -> Result<(), Error> {
        let key = key.to_string();
        let value = value.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO engine_meta (key, value, updated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                    params![key, value, timestamp(Utc::now())],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}
