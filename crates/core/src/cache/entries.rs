//! Cached entry CRUD operations.
//!
//! An entry is one stored response snapshot, keyed within its store by the
//! hash of the request method and the URL without its fragment.

use super::connection::CacheDb;
use super::hash::{canonical_url, compute_cache_key};
use crate::http::{Request, Response, ResponseKind};
use crate::Error;
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// RFC 3339 UTC timestamp with millisecond precision. Fixed width, so
/// lexical order in SQL matches chronological order.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A stored response snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEntry {
    pub store_name: String,
    pub key_hash: String,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub kind: ResponseKind,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub stored_at: String,
}

impl CachedEntry {
    /// Snapshot `response` as the entry for `request` in `store_name`.
    pub fn new(store_name: &str, request: &Request, response: &Response) -> Self {
        Self {
            store_name: store_name.to_string(),
            key_hash: compute_cache_key(&request.method, &request.url),
            method: request.method.clone(),
            url: canonical_url(&request.url).to_string(),
            status: response.status,
            status_text: response.status_text.clone(),
            kind: response.kind,
            headers: response.headers.clone(),
            body: response.body.clone(),
            stored_at: timestamp(Utc::now()),
        }
    }

    pub fn to_response(&self) -> Response {
        Response {
            status: self.status,
            status_text: self.status_text.clone(),
            headers: self.headers.clone(),
            body: self.body.clone(),
            kind: self.kind,
        }
    }

    /// Time elapsed since the entry was stored. `None` if the timestamp
    /// cannot be parsed.
    pub fn age(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        DateTime::parse_from_rfc3339(&self.stored_at)
            .ok()
            .map(|stored| now.signed_duration_since(stored.with_timezone(&Utc)))
    }
}

/// Row shape before header decoding.
struct EntryRow {
    entry: CachedEntry,
    headers_json: String,
}

impl CacheDb {
    /// Insert or replace an entry, creating its store if needed.
    ///
    /// Last write wins: a concurrent put for the same key simply replaces
    /// the previous snapshot.
    pub async fn put_entry(&self, entry: &CachedEntry) -> Result<(), Error> {
        let entry = entry.clone();
        let headers_json =
            serde_json::to_string(&entry.headers).map_err(|e| Error::CorruptEntry(format!("headers: {e}")))?;
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO stores (name, created_at) VALUES (?1, ?2)",
                    params![&entry.store_name, timestamp(Utc::now())],
                )?;
                conn.execute(
                    "INSERT INTO entries (
                        store_name, key_hash, method, url, status, status_text,
                        kind, headers_json, body, stored_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                    ON CONFLICT(store_name, key_hash) DO UPDATE SET
                        method = excluded.method,
                        url = excluded.url,
                        status = excluded.status,
                        status_text = excluded.status_text,
                        kind = excluded.kind,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![
                        &entry.store_name,
                        &entry.key_hash,
                        &entry.method,
                        &entry.url,
                        entry.status,
                        &entry.status_text,
                        entry.kind.as_str(),
                        headers_json,
                        entry.body.as_ref(),
                        &entry.stored_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get an entry by store and key hash.
    ///
    /// Returns None if the store or the key doesn't exist.
    pub async fn get_entry(&self, store_name: &str, key_hash: &str) -> Result<Option<CachedEntry>, Error> {
        let store_name = store_name.to_string();
        let key_hash = key_hash.to_string();
        let row = self
            .conn
            .call(move |conn| -> Result<Option<EntryRow>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT store_name, key_hash, method, url, status, status_text,
                            kind, headers_json, body, stored_at
                     FROM entries WHERE store_name = ?1 AND key_hash = ?2",
                )?;

                let result = stmt.query_row(params![store_name, key_hash], |row| {
                    Ok(EntryRow {
                        entry: CachedEntry {
                            store_name: row.get(0)?,
                            key_hash: row.get(1)?,
                            method: row.get(2)?,
                            url: row.get(3)?,
                            status: row.get(4)?,
                            status_text: row.get(5)?,
                            kind: ResponseKind::parse(&row.get::<_, String>(6)?),
                            headers: Vec::new(),
                            body: Bytes::from(row.get::<_, Vec<u8>>(8)?),
                            stored_at: row.get(9)?,
                        },
                        headers_json: row.get(7)?,
                    })
                });

                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        row.map(|EntryRow { mut entry, headers_json }| {
            entry.headers = serde_json::from_str(&headers_json)
                .map_err(|e| Error::CorruptEntry(format!("{}: {e}", entry.url)))?;
            Ok(entry)
        })
        .transpose()
    }

    /// Delete a single entry. Returns whether it existed.
    pub async fn delete_entry(&self, store_name: &str, key_hash: &str) -> Result<bool, Error> {
        let store_name = store_name.to_string();
        let key_hash = key_hash.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute(
                    "DELETE FROM entries WHERE store_name = ?1 AND key_hash = ?2",
                    params![store_name, key_hash],
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete entries of the given stores stored before `cutoff`.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_entries_older_than(&self, store_names: &[String], cutoff: DateTime<Utc>) -> Result<u64, Error> {
        let store_names = store_names.to_vec();
        let cutoff = timestamp(cutoff);
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let mut deleted = 0u64;
                for name in &store_names {
                    deleted += conn.execute(
                        "DELETE FROM entries WHERE store_name = ?1 AND stored_at < ?2",
                        params![name, &cutoff],
                    )? as u64;
                }
                Ok(deleted)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn tile_request() -> Request {
        Request::get(Url::parse("https://tile.openstreetmap.org/7/60/30.png").unwrap())
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let response = Response::ok("image/png", vec![0x89, b'P', b'N', b'G']);
        let entry = CachedEntry::new("sig-senegal-v3-tiles", &tile_request(), &response);

        db.put_entry(&entry).await.unwrap();

        let retrieved = db.get_entry("sig-senegal-v3-tiles", &entry.key_hash).await.unwrap().unwrap();
        assert_eq!(retrieved, entry);
        assert_eq!(retrieved.to_response(), response);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let result = db.get_entry("sig-senegal-v3-tiles", "nonexistent").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_put_replaces_existing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let first = CachedEntry::new("tiles", &tile_request(), &Response::ok("image/png", "old"));
        let second = CachedEntry::new("tiles", &tile_request(), &Response::ok("image/png", "new"));

        db.put_entry(&first).await.unwrap();
        db.put_entry(&second).await.unwrap();

        let retrieved = db.get_entry("tiles", &first.key_hash).await.unwrap().unwrap();
        assert_eq!(retrieved.body, Bytes::from("new"));
    }

    #[tokio::test]
    async fn test_same_key_isolated_per_store() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let entry = CachedEntry::new("a", &tile_request(), &Response::ok("image/png", "x"));
        db.put_entry(&entry).await.unwrap();

        assert!(db.get_entry("b", &entry.key_hash).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_entry() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let entry = CachedEntry::new("tiles", &tile_request(), &Response::ok("image/png", "x"));
        db.put_entry(&entry).await.unwrap();

        assert!(db.delete_entry("tiles", &entry.key_hash).await.unwrap());
        assert!(!db.delete_entry("tiles", &entry.key_hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_purge_older_than() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let mut old = CachedEntry::new("data", &tile_request(), &Response::ok("application/json", "{}"));
        old.stored_at = timestamp(Utc::now() - chrono::Duration::days(10));
        db.put_entry(&old).await.unwrap();

        let fresh_request = Request::get(Url::parse("https://example.com/data/Region_1.geojson").unwrap());
        let fresh = CachedEntry::new("data", &fresh_request, &Response::ok("application/json", "{}"));
        db.put_entry(&fresh).await.unwrap();

        let cutoff = Utc::now() - chrono::Duration::days(1);
        let deleted = db.purge_entries_older_than(&["data".to_string()], cutoff).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(db.get_entry("data", &old.key_hash).await.unwrap().is_none());
        assert!(db.get_entry("data", &fresh.key_hash).await.unwrap().is_some());
    }

    #[test]
    fn test_entry_age() {
        let mut entry = CachedEntry::new("tiles", &tile_request(), &Response::ok("image/png", "x"));
        let now = Utc::now();
        entry.stored_at = timestamp(now - chrono::Duration::seconds(90));
        let age = entry.age(now).unwrap();
        assert!(age >= chrono::Duration::seconds(89) && age <= chrono::Duration::seconds(91));

        entry.stored_at = "garbage".into();
        assert!(entry.age(now).is_none());
    }
}
