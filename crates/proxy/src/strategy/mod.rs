//! Caching strategies and the engine that runs them.
//!
//! The route class fixes which strategies are even possible; the
//! configured profile picks between them for shell and data traffic:
//!
//! | class       | revalidate | network-first | cache-first |
//! |-------------|------------|---------------|-------------|
//! | NetworkOnly | NetworkOnly| NetworkOnly   | NetworkOnly |
//! | Tiles       | CacheFirst | CacheFirst    | CacheFirst  |
//! | AppData     | Revalidate | NetworkFirst  | CacheFirst  |
//! | AppShell    | Revalidate | NetworkFirst  | CacheFirst  |
//!
//! Live data is never cached and tiles never expire, no matter the
//! profile.

mod cache_first;
mod network_first;
mod revalidate;

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use ranger_client::{Backend, FetchResponse};
use ranger_core::{CachedResponse, Error, Profile, RegionId, RegionStore, RequestIdentity};

use crate::notify::ChangeNotifier;
use crate::routes::RouteClass;

/// The four request-handling strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// Forward to the network unmodified; never touch the cache.
    NetworkOnly,
    /// Serve from the cache, fetching only to fill a miss.
    CacheFirst,
    /// Ask the network first, fall back to the cache on failure.
    NetworkFirst,
    /// Serve stale immediately, refresh in the background, signal on
    /// change.
    Revalidate,
}

/// Pick the strategy for a request class under the configured profile.
pub fn strategy_for(profile: Profile, class: RouteClass) -> StrategyKind {
    match class {
        RouteClass::NetworkOnly => StrategyKind::NetworkOnly,
        RouteClass::Tiles => StrategyKind::CacheFirst,
        RouteClass::AppData | RouteClass::AppShell => match profile {
            Profile::Revalidate => StrategyKind::Revalidate,
            Profile::NetworkFirst => StrategyKind::NetworkFirst,
            Profile::CacheFirst => StrategyKind::CacheFirst,
        },
    }
}

/// An intercepted request, before classification.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    /// HTTP method, usually `GET`.
    pub method: String,
    /// Absolute request URL.
    pub url: String,
    /// Skip every cache interaction and go straight to the network, as a
    /// manual-refresh escape hatch.
    pub bypass_cache: bool,
}

impl ProxyRequest {
    /// A plain GET for `url`.
    pub fn get(url: impl Into<String>) -> Self {
        Self { method: "GET".into(), url: url.into(), bypass_cache: false }
    }
}

/// Where the served bytes came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    /// A cache region answered.
    Cache,
    /// The network answered and the cache was refreshed.
    Network,
    /// The network answered on a path that never caches.
    NetworkOnly,
}

/// Response handed back to the interception point.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
    pub source: ResponseSource,
}

/// Executes strategies against one store generation.
///
/// The engine owns every background refresh it spawns: finished tasks are
/// reaped when new ones start, and [`StrategyEngine::drain_revalidations`]
/// waits for the rest on shutdown.
pub struct StrategyEngine {
    store: RegionStore,
    backend: Arc<dyn Backend>,
    notifier: ChangeNotifier,
    version: String,
    revalidations: Mutex<JoinSet<()>>,
}

impl StrategyEngine {
    pub fn new(store: RegionStore, backend: Arc<dyn Backend>, notifier: ChangeNotifier, version: String) -> Self {
        Self { store, backend, notifier, version, revalidations: Mutex::new(JoinSet::new()) }
    }

    /// Run `kind` for a request already classified as `class`.
    pub async fn execute(
        &self, kind: StrategyKind, class: RouteClass, identity: &RequestIdentity,
    ) -> Result<ProxyResponse, Error> {
        match kind {
            StrategyKind::NetworkOnly => self.network_only(identity).await,
            StrategyKind::CacheFirst => self.cache_first(&self.region_for(class)?, identity).await,
            StrategyKind::NetworkFirst => self.network_first(&self.region_for(class)?, identity).await,
            StrategyKind::Revalidate => self.revalidate(&self.region_for(class)?, identity).await,
        }
    }

    /// Region of the active generation backing `class`.
    fn region_for(&self, class: RouteClass) -> Result<RegionId, Error> {
        let name = class
            .region_name()
            .ok_or_else(|| Error::InvalidInput(format!("{class:?} has no backing region")))?;
        Ok(RegionId::tagged(name, &self.version))
    }

    /// Forward to the network untouched. Nothing is stored and failures
    /// propagate to the caller.
    async fn network_only(&self, identity: &RequestIdentity) -> Result<ProxyResponse, Error> {
        let fetched = self.backend.fetch(identity.method(), identity.request_url()).await?;
        Ok(ProxyResponse {
            status: fetched.status,
            content_type: fetched.content_type,
            body: fetched.bytes,
            source: ResponseSource::NetworkOnly,
        })
    }

    /// Wait for every in-flight background refresh to finish. Called on
    /// shutdown, and by tests that need the refresh outcome to be visible.
    pub async fn drain_revalidations(&self) {
        let mut tasks = self.revalidations.lock().await;
        while tasks.join_next().await.is_some() {}
    }
}

/// Cache entry for a fetched response, keyed by the identity that
/// requested it.
pub(crate) fn entry_from_fetch(identity: &RequestIdentity, fetched: &FetchResponse) -> CachedResponse {
    CachedResponse::new(
        identity.method(),
        identity.cache_url().as_str(),
        fetched.status,
        fetched.content_type.clone(),
        fetched.bytes.to_vec(),
    )
}

fn response_from_entry(entry: CachedResponse) -> ProxyResponse {
    ProxyResponse {
        status: entry.status,
        content_type: entry.content_type,
        body: Bytes::from(entry.body),
        source: ResponseSource::Cache,
    }
}

fn response_from_fetch(fetched: FetchResponse) -> ProxyResponse {
    ProxyResponse {
        status: fetched.status,
        content_type: fetched.content_type,
        body: fetched.bytes,
        source: ResponseSource::Network,
    }
}
