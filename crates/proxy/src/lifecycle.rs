//! Install/activate lifecycle for a proxy version.
//!
//! A version is born `Installing`, precaches the app shell, skips straight
//! to `Waiting`, and on activation evicts every region that belongs to a
//! different generation before claiming the attached instances.

use std::sync::Arc;

use tokio::sync::RwLock;
use url::Url;

use ranger_client::Backend;
use ranger_core::{AppConfig, Error, QueryMode, RegionId, RegionStore, RequestIdentity};

use crate::notify::InstanceHub;
use crate::routes::SHELL_REGION;
use crate::strategy::entry_from_fetch;

/// Where a proxy version stands in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Precaching has not finished.
    Installing,
    /// The shell is cached in full; the version is ready to take over.
    Waiting,
    /// This version owns the cache and the attached instances.
    Active,
}

/// Drives install, activation, and cache wipes for one configured version.
pub struct LifecycleManager {
    store: RegionStore,
    backend: Arc<dyn Backend>,
    hub: Arc<InstanceHub>,
    version: String,
    origin: Url,
    precache_paths: Vec<String>,
    legacy_markers: Vec<String>,
    state: RwLock<LifecycleState>,
}

impl LifecycleManager {
    pub fn new(
        store: RegionStore, backend: Arc<dyn Backend>, hub: Arc<InstanceHub>, config: &AppConfig,
    ) -> Result<Self, Error> {
        let origin = Url::parse(&config.app_origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self {
            store,
            backend,
            hub,
            version: config.version.clone(),
            origin,
            precache_paths: config.precache_paths.clone(),
            legacy_markers: config.legacy_markers.clone(),
            state: RwLock::new(LifecycleState::Installing),
        })
    }

    /// Precache the app shell, all-or-nothing.
    ///
    /// Every configured path is fetched before anything is written, so a
    /// failed install leaves no partial shell behind. Success requests
    /// skip-waiting: the state moves straight to `Waiting`.
    pub async fn install(&self) -> Result<(), Error> {
        self.expect_state(LifecycleState::Installing, "install").await?;

        let mut fetched = Vec::with_capacity(self.precache_paths.len());
        for path in &self.precache_paths {
            let url = self.origin.join(path).map_err(|e| Error::InvalidUrl(format!("{path}: {e}")))?;
            let identity = RequestIdentity::new("GET", url, QueryMode::Ignore);
            match self.backend.fetch(identity.method(), identity.request_url()).await {
                Ok(response) => fetched.push((identity, response)),
                Err(e) => {
                    tracing::error!(path = %path, error = %e, "precache fetch failed; install aborted");
                    return Err(Error::InstallFailed(format!("{path}: {e}")));
                }
            }
        }

        let region = self.shell_region();
        self.store.ensure_region(&region).await?;
        for (identity, response) in &fetched {
            self.store
                .put_entry(&region, &identity.slot_key(), &entry_from_fetch(identity, response))
                .await?;
        }

        tracing::info!(region = %region, paths = fetched.len(), "shell precached; skipping wait");
        *self.state.write().await = LifecycleState::Waiting;
        Ok(())
    }

    /// Promote this version: evict regions belonging to other generations,
    /// claim every attached instance, go `Active`.
    ///
    /// Tagged regions survive only on an exact version match. Untagged
    /// regions are legacy debris and are deleted when their bare name
    /// carries a configured legacy marker.
    pub async fn activate(&self) -> Result<(), Error> {
        self.expect_state(LifecycleState::Waiting, "activate").await?;

        for record in self.store.list_regions().await? {
            let evict = match record.id.version() {
                Some(tag) => tag != self.version,
                None => self.is_legacy_name(record.id.name()),
            };
            if evict {
                tracing::info!(region = %record.id, "evicting stale region");
                self.store.delete_region(&record.id).await?;
            }
        }

        self.hub.claim(&self.version).await;
        *self.state.write().await = LifecycleState::Active;
        tracing::info!(version = %self.version, "activated");
        Ok(())
    }

    /// Wipe every region unconditionally, current version included.
    /// Allowed in any state; instances reach it through the control
    /// channel.
    pub async fn clear_all(&self) -> Result<u64, Error> {
        let removed = self.store.clear_all().await?;
        tracing::info!(regions = removed, "cache cleared");
        Ok(removed)
    }

    pub async fn state(&self) -> LifecycleState {
        *self.state.read().await
    }

    async fn expect_state(&self, expected: LifecycleState, operation: &str) -> Result<(), Error> {
        let state = *self.state.read().await;
        if state != expected {
            return Err(Error::Lifecycle(format!("{operation} requires {expected:?}, state is {state:?}")));
        }
        Ok(())
    }

    fn shell_region(&self) -> RegionId {
        RegionId::tagged(SHELL_REGION, &self.version)
    }

    fn is_legacy_name(&self, name: &str) -> bool {
        self.legacy_markers.iter().any(|marker| name.contains(marker.as_str()))
    }
}
