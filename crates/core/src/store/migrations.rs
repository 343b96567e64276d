use tokio_rusqlite::Connection;

use crate::error::Error;

/// Ordered schema migrations. Each entry runs at most once, tracked by
/// name in the `_migrations` table.
const MIGRATIONS: &[(&str, &str)] = &[(
    "001_regions",
    include_str!("../../migrations/001_regions.sql"),
)];

/// Applies any migrations that have not yet run.
pub(crate) async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                name TEXT PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            [],
        )
        .map_err(|e| Error::MigrationFailed(e.to_string()))?;

        for (name, sql) in MIGRATIONS {
            let applied: bool = conn
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM _migrations WHERE name = ?1)",
                    [name],
                    |row| row.get(0),
                )
                .map_err(|e| Error::MigrationFailed(e.to_string()))?;

            if !applied {
                conn.execute_batch(sql)
                    .map_err(|e| Error::MigrationFailed(format!("{name}: {e}")))?;
                conn.execute("INSERT INTO _migrations (name) VALUES (?1)", [name])
                    .map_err(|e| Error::MigrationFailed(e.to_string()))?;
            }
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}
