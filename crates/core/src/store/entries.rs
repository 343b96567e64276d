//! Cached response entries.
//!
//! An entry is a complete upstream response stored verbatim under its
//! slot key. Writes are single-statement UPSERTs so readers never see a
//! half-written body.

use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::RegionStore;
use super::regions::RegionId;
use crate::Error;

/// A cached upstream response.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub method: String,
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    pub stored_at: String,
}

impl CachedResponse {
    /// Builds an entry stamped with the current time.
    pub fn new(
        method: impl Into<String>,
        url: impl Into<String>,
        status: u16,
        content_type: Option<String>,
        body: Vec<u8>,
    ) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            status,
            content_type,
            body,
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl RegionStore {
    /// Insert or replace the entry at `slot`.
    ///
    /// Recreates the region row if it is missing, so a write that races a
    /// wipe lands in a fresh region rather than failing.
    pub async fn put_entry(&self, region: &RegionId, slot: &str, entry: &CachedResponse) -> Result<(), Error> {
        let name = region.name().to_string();
        let version = region.version_column().to_string();
        let slot = slot.to_string();
        let entry = entry.clone();
        let created_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO regions (name, version, created_at) VALUES (?1, ?2, ?3)",
                    params![name, version, created_at],
                )?;
                conn.execute(
                    "INSERT INTO entries (
                        region_name, region_version, slot, method, url,
                        status_code, content_type, body, stored_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                    ON CONFLICT(region_name, region_version, slot) DO UPDATE SET
                        method = excluded.method,
                        url = excluded.url,
                        status_code = excluded.status_code,
                        content_type = excluded.content_type,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![
                        name,
                        version,
                        slot,
                        &entry.method,
                        &entry.url,
                        entry.status as i64,
                        &entry.content_type,
                        &entry.body,
                        &entry.stored_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Fetch the entry at `slot`. A miss is `None`, not an error.
    pub async fn get_entry(&self, region: &RegionId, slot: &str) -> Result<Option<CachedResponse>, Error> {
        let name = region.name().to_string();
        let version = region.version_column().to_string();
        let slot = slot.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CachedResponse>, Error> {
                let result = conn.query_row(
                    "SELECT method, url, status_code, content_type, body, stored_at
                     FROM entries
                     WHERE region_name = ?1 AND region_version = ?2 AND slot = ?3",
                    params![name, version, slot],
                    |row| {
                        Ok(CachedResponse {
                            method: row.get(0)?,
                            url: row.get(1)?,
                            status: row.get::<_, i64>(2)? as u16,
                            content_type: row.get(3)?,
                            body: row.get(4)?,
                            stored_at: row.get(5)?,
                        })
                    },
                );

                match result {
                    Ok(entry) => Ok(Some(entry)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries currently stored in the region.
    pub async fn entry_count(&self, region: &RegionId) -> Result<u64, Error> {
        let name = region.name().to_string();
        let version = region.version_column().to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM entries WHERE region_name = ?1 AND region_version = ?2",
                    params![name, version],
                    |row| row.get(0),
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
