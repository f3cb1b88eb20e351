//! Database connection management with pragma configuration.
//!
//! Opens the SQLite database backing every cache store, applies the
//! pragmas (WAL, foreign keys for store → entry cascades) and runs
//! migrations.

use super::migrations;
use crate::Error;
use std::path::Path;
use tokio_rusqlite::Connection;

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA temp_store=MEMORY;
     PRAGMA foreign_keys=ON;";

/// Cache database handle.
///
/// Wraps a tokio-rusqlite Connection that runs database operations
/// on a background thread. Cloning shares the same connection.
#[derive(Clone, Debug)]
pub struct CacheDb {
    pub(crate) conn: Connection,
}

impl CacheDb {
    /// Open a database at the specified path.
    ///
    /// Creates the file if it doesn't exist, applies pragmas and runs any
    /// pending migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).await.map_err(|e| Error::Database(e.into()))?;
        tracing::debug!(path = %path.display(), "opened cache database");
        Self::configure(conn).await
    }

    /// Open an in-memory database for testing.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Self::configure(conn).await
    }

    /// Toggle `PRAGMA query_only`. While on, every write fails with a
    /// database error and reads keep working.
    pub async fn set_read_only(&self, read_only: bool) -> Result<(), Error> {
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.pragma_update(None, "query_only", read_only)?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn configure(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| -> Result<(), Error> {
            conn.execute_batch(PRAGMAS)?;
            Ok(())
        })
        .await
        .map_err(Error::from)?;

        migrations::run(&conn).await?;

        Ok(Self { conn })
    }
}
