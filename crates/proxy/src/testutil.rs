//! Test doubles shared across the crate's unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use url::Url;

use ranger_client::{Backend, FetchResponse};
use ranger_core::{Error, QueryMode, RegionStore, RequestIdentity};

use crate::notify::{ChangeNotifier, InstanceHub};
use crate::strategy::StrategyEngine;

/// Scripted transport: each URL maps to a FIFO of outcomes, and a fetch
/// pops the front. An exhausted queue answers `NetworkUnavailable`, so an
/// unscripted URL behaves like a dead network.
pub(crate) struct FakeBackend {
    responses: Mutex<HashMap<String, Vec<Result<FetchResponse, Error>>>>,
    requests: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { responses: Mutex::new(HashMap::new()), requests: Mutex::new(Vec::new()) })
    }

    /// Script a 200 response with a JSON content type.
    pub fn ok(&self, url: &str, body: &[u8]) {
        self.push(url, Ok(make_response(url, body)));
    }

    /// Script a transport failure.
    pub fn fail(&self, url: &str) {
        self.push(url, Err(Error::NetworkUnavailable(format!("scripted failure for {url}"))));
    }

    /// Script an upstream error status.
    pub fn status(&self, url: &str, code: u16) {
        self.push(url, Err(Error::UpstreamStatus(code)));
    }

    fn push(&self, url: &str, outcome: Result<FetchResponse, Error>) {
        self.responses.lock().unwrap().entry(url.to_string()).or_default().push(outcome);
    }

    /// Total number of fetches seen.
    pub fn fetch_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Every fetch seen, as "METHOD url" lines in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Backend for FakeBackend {
    async fn fetch(&self, method: &str, url: &Url) -> Result<FetchResponse, Error> {
        self.requests.lock().unwrap().push(format!("{method} {url}"));
        let mut responses = self.responses.lock().unwrap();
        match responses.get_mut(url.as_str()) {
            Some(queue) if !queue.is_empty() => queue.remove(0),
            _ => Err(Error::NetworkUnavailable(format!("no scripted response for {url}"))),
        }
    }
}

fn make_response(url: &str, body: &[u8]) -> FetchResponse {
    let url = Url::parse(url).unwrap();
    FetchResponse {
        url: url.clone(),
        final_url: url,
        status: 200,
        content_type: Some("application/json".to_string()),
        bytes: Bytes::copy_from_slice(body),
        fetch_ms: 0,
    }
}

/// GET identity for `url` under the given query mode.
pub(crate) fn identity(url: &str, mode: QueryMode) -> RequestIdentity {
    RequestIdentity::new("GET", Url::parse(url).unwrap(), mode)
}

/// Engine over a fresh in-memory store, active version `v3`.
pub(crate) async fn make_engine(backend: Arc<FakeBackend>) -> (StrategyEngine, Arc<InstanceHub>, RegionStore) {
    let store = RegionStore::open_in_memory().await.unwrap();
    let hub = Arc::new(InstanceHub::new());
    let notifier = ChangeNotifier::new(Arc::clone(&hub));
    let engine = StrategyEngine::new(store.clone(), backend, notifier, "v3".into());
    (engine, hub, store)
}
