use std::path::Path;

use tokio_rusqlite::Connection;

use crate::error::Error;

use super::migrations;

/// Async handle to the SQLite database backing every cache region.
///
/// Cloning is cheap; all clones share one serialized connection.
#[derive(Clone)]
pub struct RegionStore {
    pub(crate) conn: Connection,
}

impl RegionStore {
    /// Opens (or creates) the store at the given path and runs pending
    /// migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let conn = Connection::open(path.as_ref()).await?;
        Self::init(conn).await
    }

    /// Opens an in-memory store, used by tests.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode=WAL;
                 PRAGMA synchronous=NORMAL;
                 PRAGMA temp_store=MEMORY;
                 PRAGMA foreign_keys=ON;",
            )?;
            Ok(())
        })
        .await
        .map_err(Error::Database)?;

        migrations::run(&conn).await?;
        Ok(Self { conn })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory_runs_migrations() {
        let store = RegionStore::open_in_memory().await.unwrap();

        let count: i64 = store
            .conn
            .call(|conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('regions', 'entries')",
                    [],
                    |row| row.get(0),
                )
            })
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let store = RegionStore::open_in_memory().await.unwrap();

        let enabled: i64 = store
            .conn
            .call(|conn| conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0)))
            .await
            .unwrap();
        assert_eq!(enabled, 1);
    }
}
