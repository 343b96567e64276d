//! Stale-while-revalidate with change signaling.

use std::sync::Arc;

use tokio::sync::oneshot;

use ranger_client::FetchResponse;
use ranger_core::{Error, RegionId, RequestIdentity};

use super::{ProxyResponse, StrategyEngine, entry_from_fetch, response_from_entry, response_from_fetch};

impl StrategyEngine {
    /// Serve stale immediately, refresh in the background.
    ///
    /// The refresh starts before the cache lookup and runs exactly once
    /// per call; concurrent revalidations are not deduplicated. A cache
    /// hit returns without waiting for it; on a miss the caller waits for
    /// the refresh outcome itself. Either way the task keeps running after
    /// the response is delivered: it compares the fresh payload against
    /// what the region held at completion time, signals attached instances
    /// on a difference, then overwrites the entry.
    pub(crate) async fn revalidate(
        &self, region: &RegionId, identity: &RequestIdentity,
    ) -> Result<ProxyResponse, Error> {
        let slot = identity.slot_key();
        let fresh = self.spawn_revalidation(region.clone(), identity.clone(), slot.clone()).await;

        if let Some(entry) = self.store.get_entry(region, &slot).await? {
            tracing::debug!(region = %region, url = %identity.cache_url(), "serving cached; refresh in flight");
            return Ok(response_from_entry(entry));
        }

        match fresh.await {
            Ok(outcome) => outcome.map(response_from_fetch),
            Err(_) => Err(Error::NetworkUnavailable("refresh task dropped".into())),
        }
    }

    /// Spawn the background refresh and hand back a receiver for its
    /// outcome. The task lands in the engine's join set; refreshes that
    /// already finished are reaped here before the new one starts.
    async fn spawn_revalidation(
        &self, region: RegionId, identity: RequestIdentity, slot: String,
    ) -> oneshot::Receiver<Result<FetchResponse, Error>> {
        let (tx, rx) = oneshot::channel();
        let store = self.store.clone();
        let backend = Arc::clone(&self.backend);
        let notifier = self.notifier.clone();

        let mut tasks = self.revalidations.lock().await;
        while tasks.try_join_next().is_some() {}

        tasks.spawn(async move {
            let fetched = match backend.fetch(identity.method(), identity.request_url()).await {
                Ok(fetched) => fetched,
                Err(e) => {
                    tracing::warn!(url = %identity.cache_url(), error = %e, "refresh failed; cached entry kept");
                    let _ = tx.send(Err(e));
                    return;
                }
            };

            let previous = match store.get_entry(&region, &slot).await {
                Ok(previous) => previous,
                Err(e) => {
                    tracing::warn!(region = %region, error = %e, "refresh could not read region");
                    let _ = tx.send(Err(e));
                    return;
                }
            };

            notifier
                .notify_if_changed(&identity, previous.as_ref().map(|entry| entry.body.as_slice()), &fetched.bytes)
                .await;

            if let Err(e) = store.put_entry(&region, &slot, &entry_from_fetch(&identity, &fetched)).await {
                tracing::warn!(region = %region, error = %e, "refresh could not write region");
                let _ = tx.send(Err(e));
                return;
            }

            let _ = tx.send(Ok(fetched));
        });

        rx
    }
}
