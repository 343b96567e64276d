//! Region bookkeeping.
//!
//! A region is a durable named store of cached responses, the unit of
//! versioned eviction. Region rows are created lazily and deleted as a
//! whole together with their entries.

use std::fmt;

use tokio_rusqlite::params;

use super::connection::RegionStore;
use crate::Error;

/// Identity of a cache region: a logical name plus an optional version tag.
///
/// The tag lives beside the name rather than inside it so eviction can
/// compare versions structurally. Untagged regions come from legacy
/// deployments that baked a marker into the bare name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegionId {
    name: String,
    version: Option<String>,
}

impl RegionId {
    /// A region carrying an explicit version tag.
    pub fn tagged(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self { name: name.into(), version: Some(version.into()) }
    }

    /// An untagged region, as left behind by legacy deployments.
    pub fn untagged(name: impl Into<String>) -> Self {
        Self { name: name.into(), version: None }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Column form of the version. The empty string stands in for
    /// "untagged" so the version can participate in the composite key.
    pub(crate) fn version_column(&self) -> &str {
        self.version.as_deref().unwrap_or("")
    }

    pub(crate) fn from_columns(name: String, version: String) -> Self {
        let version = if version.is_empty() { None } else { Some(version) };
        Self { name, version }
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}@{}", self.name, v),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A region row as listed from the store.
#[derive(Debug, Clone)]
pub struct RegionRecord {
    pub id: RegionId,
    pub created_at: String,
}

impl RegionStore {
    /// Creates the region row if it is not already present. Idempotent,
    /// so callers can treat it as "open".
    pub async fn ensure_region(&self, region: &RegionId) -> Result<(), Error> {
        let name = region.name().to_string();
        let version = region.version_column().to_string();
        let created_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO regions (name, version, created_at) VALUES (?1, ?2, ?3)",
                    params![name, version, created_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Lists every region currently present.
    pub async fn list_regions(&self) -> Result<Vec<RegionRecord>, Error> {
        self.conn
            .call(move |conn| -> Result<Vec<RegionRecord>, Error> {
                let mut stmt =
                    conn.prepare("SELECT name, version, created_at FROM regions ORDER BY name, version")?;
                let rows = stmt.query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })?;

                let mut records = Vec::new();
                for row in rows {
                    let (name, version, created_at) = row?;
                    records.push(RegionRecord { id: RegionId::from_columns(name, version), created_at });
                }
                Ok(records)
            })
            .await
            .map_err(Error::from)
    }

    /// Deletes a region and, through the cascade, all of its entries.
    /// Returns whether the region existed.
    pub async fn delete_region(&self, region: &RegionId) -> Result<bool, Error> {
        let name = region.name().to_string();
        let version = region.version_column().to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute(
                    "DELETE FROM regions WHERE name = ?1 AND version = ?2",
                    params![name, version],
                )?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Deletes every region and every entry unconditionally. Returns the
    /// number of regions removed.
    pub async fn clear_all(&self) -> Result<u64, Error> {
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM regions", [])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
