//! Database schema migrations.
//!
//! Applied migrations are recorded in `_migrations`; each SQL batch uses
//! `CREATE ... IF NOT EXISTS` so re-running a batch is harmless.

use super::Error;
use tokio_rusqlite::{Connection, params};

/// A single schema step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// Ordered migration list. Versions must increase.
const MIGRATIONS: &[Migration] = &[
    Migration { version: 1, name: "stores", sql: include_str!("../../migrations/001_stores.sql") },
    Migration { version: 2, name: "engine_meta", sql: include_str!("../../migrations/002_engine_meta.sql") },
];

/// Run any pending migrations.
///
/// # Errors
///
/// Returns an error if a migration SQL batch fails to execute.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    let applied = conn
        .call(|conn| -> Result<Vec<&'static str>, Error> {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS _migrations (
                    version INTEGER PRIMARY KEY,
                    applied_at TEXT NOT NULL
                )",
                [],
            )?;

            let current: i64 =
                conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?;

            let mut applied = Vec::new();
            for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
                conn.execute_batch(migration.sql)
                    .map_err(|e| Error::MigrationFailed(format!("{} ({}): {e}", migration.version, migration.name)))?;
                conn.execute(
                    "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
                    params![migration.version, chrono::Utc::now().to_rfc3339()],
                )?;
                applied.push(migration.name);
            }

            Ok(applied)
        })
        .await
        .map_err(Error::from)?;

    if !applied.is_empty() {
        tracing::debug!(?applied, "applied cache migrations");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_versions_increase() {
        let versions: Vec<i64> = MIGRATIONS.iter().map(|m| m.version).collect();
        assert!(versions.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();
        run(&conn).await.unwrap();

        let tables: i64 = conn
            .call(|conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master
                     WHERE type='table' AND name IN ('stores', 'entries', 'engine_meta')",
                    [],
                    |row| row.get(0),
                )
            })
            .await
            .unwrap();

        assert_eq!(tables, 3);
    }

    #[tokio::test]
    async fn test_migrations_version_tracking() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();

        let count: i64 = conn
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM _migrations", [], |row| row.get(0)))
            .await
            .unwrap();

        assert_eq!(count, MIGRATIONS.len() as i64);
    }
}
