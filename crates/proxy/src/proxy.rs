//! The assembled proxy: route table, strategy engine, lifecycle, and the
//! control channel wired together behind one handle.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use ranger_client::{Backend, FetchClient, FetchConfig, canonicalize};
use ranger_core::{AppConfig, CachedResponse, Error, Profile, RegionId, RegionStore, RequestIdentity};

use crate::lifecycle::{LifecycleManager, LifecycleState};
use crate::notify::{ChangeNotifier, ControlCommand, InstanceHub, InstanceId, UpdateSignal};
use crate::routes::RouteTable;
use crate::strategy::{ProxyRequest, ProxyResponse, StrategyEngine, StrategyKind, strategy_for};

const CONTROL_BUFFER: usize = 16;

/// One proxy generation: classifies requests, runs the matching strategy,
/// and manages the cache regions for its configured version.
///
/// Control commands from attached instances arrive on an internal channel
/// and are pumped by a background task, so a `clearCache` never blocks the
/// instance that sent it.
pub struct Proxy {
    routes: RouteTable,
    profile: Profile,
    engine: StrategyEngine,
    lifecycle: Arc<LifecycleManager>,
    hub: Arc<InstanceHub>,
    store: RegionStore,
    version: String,
    control_tx: mpsc::Sender<ControlCommand>,
    pump: JoinHandle<()>,
}

impl Proxy {
    /// Build a proxy over a real HTTP client and the configured database.
    pub async fn new(config: AppConfig) -> Result<Self, Error> {
        let client = FetchClient::new(FetchConfig::from_app_config(&config))?;
        Self::with_backend(config, Arc::new(client)).await
    }

    /// Build over a caller-supplied backend, opening the configured store.
    pub async fn with_backend(config: AppConfig, backend: Arc<dyn Backend>) -> Result<Self, Error> {
        let store = RegionStore::open(&config.db_path).await?;
        Self::with_store(config, store, backend)
    }

    /// Build over a caller-managed store and backend. Used when several
    /// generations share one database, and by tests.
    pub fn with_store(
        config: AppConfig, store: RegionStore, backend: Arc<dyn Backend>,
    ) -> Result<Self, Error> {
        let hub = Arc::new(InstanceHub::new());
        let notifier = ChangeNotifier::new(Arc::clone(&hub));
        let engine = StrategyEngine::new(
            store.clone(),
            Arc::clone(&backend),
            notifier,
            config.version.clone(),
        );
        let lifecycle = Arc::new(LifecycleManager::new(
            store.clone(),
            backend,
            Arc::clone(&hub),
            &config,
        )?);

        let (control_tx, mut control_rx) = mpsc::channel(CONTROL_BUFFER);
        let pump_lifecycle = Arc::clone(&lifecycle);
        let pump = tokio::spawn(async move {
            while let Some(command) = control_rx.recv().await {
                match command {
                    ControlCommand::ClearCache => {
                        if let Err(e) = pump_lifecycle.clear_all().await {
                            tracing::error!(error = %e, "clearCache command failed");
                        }
                    }
                }
            }
        });

        Ok(Self {
            routes: RouteTable::from_config(&config),
            profile: config.profile,
            engine,
            lifecycle,
            hub,
            store,
            version: config.version,
            control_tx,
            pump,
        })
    }

    /// Run the lifecycle to completion: precache the shell, then take over
    /// the cache and the attached instances.
    pub async fn start(&self) -> Result<(), Error> {
        self.lifecycle.install().await?;
        self.lifecycle.activate().await
    }

    /// Route one request through its strategy.
    pub async fn handle(&self, request: ProxyRequest) -> Result<ProxyResponse, Error> {
        let url = canonicalize(&request.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let class = self.routes.classify(&url);
        let identity = RequestIdentity::new(&request.method, url, class.query_mode());
        let kind = if request.bypass_cache {
            StrategyKind::NetworkOnly
        } else {
            strategy_for(self.profile, class)
        };
        tracing::debug!(url = %identity.request_url(), class = ?class, kind = ?kind, "dispatching");
        self.engine.execute(kind, class, &identity).await
    }

    /// Look up the cached entry a GET for `url` would be served from,
    /// without touching the network.
    pub async fn inspect(&self, url: &str) -> Result<CachedResponse, Error> {
        let url = canonicalize(url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let class = self.routes.classify(&url);
        let identity = RequestIdentity::new("GET", url, class.query_mode());
        let slot = identity.slot_key();
        let name = class.region_name().ok_or_else(|| Error::CacheMiss(slot.clone()))?;
        let region = RegionId::tagged(name, &self.version);
        self.store.get_entry(&region, &slot).await?.ok_or(Error::CacheMiss(slot))
    }

    /// Attach an instance to receive update signals.
    pub async fn attach_instance(&self) -> (InstanceId, mpsc::Receiver<UpdateSignal>) {
        self.hub.attach().await
    }

    /// A sender instances use to issue control commands.
    pub fn control_handle(&self) -> mpsc::Sender<ControlCommand> {
        self.control_tx.clone()
    }

    pub async fn lifecycle_state(&self) -> LifecycleState {
        self.lifecycle.state().await
    }

    /// Drain background refreshes, then stop the control pump.
    ///
    /// The pump exits once every control handle is dropped; callers still
    /// holding one keep the channel open and this call waiting.
    pub async fn shutdown(self) {
        self.engine.drain_revalidations().await;
        drop(self.control_tx);
        if let Err(e) = self.pump.await {
            tracing::warn!(error = %e, "control pump did not exit cleanly");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::strategy::ResponseSource;
    use crate::testutil::FakeBackend;

    fn test_config(version: &str) -> AppConfig {
        AppConfig {
            version: version.into(),
            profile: Profile::CacheFirst,
            ..Default::default()
        }
    }

    fn script_shell(backend: &FakeBackend) {
        backend.ok("http://localhost:8080/", b"<html>root</html>");
        backend.ok("http://localhost:8080/index.html", b"<html>index</html>");
        backend.ok("http://localhost:8080/parks/loc_manifest.json", b"[]");
    }

    async fn started_proxy(backend: Arc<FakeBackend>) -> (Proxy, RegionStore) {
        script_shell(&backend);
        let store = RegionStore::open_in_memory().await.unwrap();
        let proxy = Proxy::with_store(test_config("v3"), store.clone(), backend).unwrap();
        proxy.start().await.unwrap();
        (proxy, store)
    }

    #[tokio::test]
    async fn test_start_precaches_and_activates() {
        let backend = FakeBackend::new();
        let (proxy, store) = started_proxy(Arc::clone(&backend)).await;

        assert_eq!(proxy.lifecycle_state().await, LifecycleState::Active);
        assert_eq!(store.entry_count(&RegionId::tagged("shell", "v3")).await.unwrap(), 3);

        // The precached shell serves from cache without another fetch.
        let fetched_during_install = backend.fetch_count();
        let response = proxy.handle(ProxyRequest::get("http://localhost:8080/index.html")).await.unwrap();
        assert_eq!(response.source, ResponseSource::Cache);
        assert_eq!(response.body.as_ref(), b"<html>index</html>");
        assert_eq!(backend.fetch_count(), fetched_during_install);
    }

    #[tokio::test]
    async fn test_new_version_takeover_evicts_previous_generation() {
        let backend = FakeBackend::new();
        let store = RegionStore::open_in_memory().await.unwrap();

        script_shell(&backend);
        backend.ok("http://localhost:8080/parks/yellowstone.json", b"{\"name\":\"Yellowstone\"}");
        let old = Proxy::with_store(test_config("v2"), store.clone(), backend.clone()).unwrap();
        old.start().await.unwrap();
        old.handle(ProxyRequest::get("http://localhost:8080/parks/yellowstone.json")).await.unwrap();
        assert_eq!(store.entry_count(&RegionId::tagged("data", "v2")).await.unwrap(), 1);
        old.shutdown().await;

        script_shell(&backend);
        let new = Proxy::with_store(test_config("v3"), store.clone(), backend.clone()).unwrap();
        new.start().await.unwrap();

        let kept: Vec<String> = store
            .list_regions()
            .await
            .unwrap()
            .into_iter()
            .map(|record| record.id.to_string())
            .collect();
        assert_eq!(kept, vec!["shell@v3".to_string()]);

        // The park payload is gone with its generation and misses afresh.
        let miss = new.inspect("http://localhost:8080/parks/yellowstone.json").await;
        assert!(matches!(miss, Err(Error::CacheMiss(_))));
    }

    #[tokio::test]
    async fn test_bypass_cache_skips_read_and_write() {
        let backend = FakeBackend::new();
        let (proxy, store) = started_proxy(Arc::clone(&backend)).await;
        backend.ok("http://localhost:8080/about.html", b"first");
        backend.ok("http://localhost:8080/about.html", b"second");

        let bypass = ProxyRequest {
            bypass_cache: true,
            ..ProxyRequest::get("http://localhost:8080/about.html")
        };
        let response = proxy.handle(bypass).await.unwrap();
        assert_eq!(response.source, ResponseSource::NetworkOnly);
        assert_eq!(response.body.as_ref(), b"first");

        // Nothing was stored, so the plain request misses and fetches again.
        let response = proxy.handle(ProxyRequest::get("http://localhost:8080/about.html")).await.unwrap();
        assert_eq!(response.source, ResponseSource::Network);
        assert_eq!(response.body.as_ref(), b"second");
        assert_eq!(store.entry_count(&RegionId::tagged("shell", "v3")).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_live_host_is_never_cached() {
        let backend = FakeBackend::new();
        let (proxy, store) = started_proxy(Arc::clone(&backend)).await;
        backend.ok("https://api.open-meteo.com/v1/forecast?lat=44.6", b"{\"temp\":12}");

        let url = "https://api.open-meteo.com/v1/forecast?lat=44.6";
        let response = proxy.handle(ProxyRequest::get(url)).await.unwrap();
        assert_eq!(response.source, ResponseSource::NetworkOnly);

        let regions = store.list_regions().await.unwrap();
        assert_eq!(regions.len(), 1, "only the shell region should exist");
        assert!(matches!(proxy.inspect(url).await, Err(Error::CacheMiss(_))));
    }

    #[tokio::test]
    async fn test_clear_cache_command_drains_before_shutdown() {
        let backend = FakeBackend::new();
        let (proxy, store) = started_proxy(Arc::clone(&backend)).await;
        assert!(!store.list_regions().await.unwrap().is_empty());

        proxy.control_handle().send(ControlCommand::ClearCache).await.unwrap();
        proxy.shutdown().await;

        assert!(store.list_regions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_inspect_returns_cached_entry() {
        let backend = FakeBackend::new();
        let (proxy, _store) = started_proxy(Arc::clone(&backend)).await;
        backend.ok("http://localhost:8080/parks/acadia.json", b"{\"name\":\"Acadia\"}");

        proxy.handle(ProxyRequest::get("http://localhost:8080/parks/acadia.json")).await.unwrap();

        let entry = proxy.inspect("http://localhost:8080/parks/acadia.json").await.unwrap();
        assert_eq!(entry.body, b"{\"name\":\"Acadia\"}");
        assert_eq!(entry.status, 200);

        let miss = proxy.inspect("http://localhost:8080/parks/zion.json").await;
        assert!(matches!(miss, Err(Error::CacheMiss(_))));
    }

    #[tokio::test]
    async fn test_handle_rejects_unparseable_url() {
        let backend = FakeBackend::new();
        let store = RegionStore::open_in_memory().await.unwrap();
        let proxy = Proxy::with_store(test_config("v3"), store, backend).unwrap();

        let result = proxy.handle(ProxyRequest::get("   ")).await;
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }
}
