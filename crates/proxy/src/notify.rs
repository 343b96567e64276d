//! Update signals and the registry of attached application instances.
//!
//! Attached instances receive push notifications over per-instance
//! channels. The hub is the only owner of the sending ends; instances hold
//! receivers and can neither enumerate nor reach each other. Delivery is
//! best-effort: a slow or departed instance is skipped, never waited on.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, mpsc};

use ranger_core::RequestIdentity;

/// Per-instance signal buffer. A full buffer drops the signal for that
/// instance only.
const SIGNAL_BUFFER: usize = 16;

/// Identifier of an attached application instance.
pub type InstanceId = u64;

/// Signal pushed to attached instances after a background refresh produced
/// different bytes than the cache held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum UpdateSignal {
    /// The payload behind a cached response changed; the instance should
    /// refresh its view.
    #[serde(rename = "UI_UPDATE")]
    UiUpdate,
}

/// Command an attached instance sends to the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum ControlCommand {
    /// Wipe every cache region unconditionally.
    #[serde(rename = "clearCache")]
    ClearCache,
}

struct InstanceSlot {
    sender: mpsc::Sender<UpdateSignal>,
    controlled_by: Option<String>,
}

/// Registry of attached application instances.
///
/// Uses a HashMap behind a tokio RwLock, mirroring attach/detach churn
/// against frequent read-side broadcasts.
pub struct InstanceHub {
    instances: RwLock<HashMap<InstanceId, InstanceSlot>>,
    next_id: AtomicU64,
    active_version: RwLock<Option<String>>,
}

impl InstanceHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self {
            instances: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            active_version: RwLock::new(None),
        }
    }

    /// Attach a new instance, returning its id and the receiving end of
    /// its signal channel.
    ///
    /// An instance attached after a version has claimed control starts
    /// controlled by that version.
    pub async fn attach(&self) -> (InstanceId, mpsc::Receiver<UpdateSignal>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(SIGNAL_BUFFER);
        let controlled_by = self.active_version.read().await.clone();

        self.instances.write().await.insert(id, InstanceSlot { sender, controlled_by });
        tracing::debug!(instance = id, "instance attached");
        (id, receiver)
    }

    /// Detach an instance; its channel closes when the receiver is dropped.
    pub async fn detach(&self, id: InstanceId) {
        if self.instances.write().await.remove(&id).is_some() {
            tracing::debug!(instance = id, "instance detached");
        }
    }

    /// Push `signal` to every attached instance without blocking. Returns
    /// how many instances accepted it; failed deliveries are logged and
    /// skipped.
    pub async fn broadcast(&self, signal: UpdateSignal) -> usize {
        let instances = self.instances.read().await;
        let mut delivered = 0;
        for (id, slot) in instances.iter() {
            match slot.sender.try_send(signal) {
                Ok(()) => delivered += 1,
                Err(e) => tracing::warn!(instance = id, "signal dropped: {e}"),
            }
        }
        delivered
    }

    /// Record `version` as the controlling version on every attached
    /// instance and on all future attaches.
    pub async fn claim(&self, version: &str) {
        *self.active_version.write().await = Some(version.to_string());

        let mut instances = self.instances.write().await;
        for slot in instances.values_mut() {
            slot.controlled_by = Some(version.to_string());
        }
        tracing::info!(version = version, instances = instances.len(), "instances claimed");
    }

    /// Number of currently attached instances.
    pub async fn instance_count(&self) -> usize {
        self.instances.read().await.len()
    }

    /// Version controlling the given instance, if any.
    pub async fn controlled_by(&self, id: InstanceId) -> Option<String> {
        self.instances.read().await.get(&id).and_then(|slot| slot.controlled_by.clone())
    }
}

impl Default for InstanceHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Emits update signals when a refreshed payload differs from the cached
/// one.
#[derive(Clone)]
pub struct ChangeNotifier {
    hub: Arc<InstanceHub>,
}

impl ChangeNotifier {
    pub fn new(hub: Arc<InstanceHub>) -> Self {
        Self { hub }
    }

    /// Compare payloads and broadcast on a difference.
    ///
    /// `old == None` is a first population: there is nothing to compare
    /// against, so no signal goes out. Returns the number of instances
    /// that accepted the signal. Never errors; notification is advisory.
    pub async fn notify_if_changed(&self, identity: &RequestIdentity, old: Option<&[u8]>, new: &[u8]) -> usize {
        let Some(old) = old else {
            return 0;
        };
        if old == new {
            return 0;
        }

        tracing::info!(url = %identity.cache_url(), "payload changed; signaling instances");
        self.hub.broadcast(UpdateSignal::UiUpdate).await
    }
}
