//! Cache-first with refill.

use ranger_core::{Error, RegionId, RequestIdentity};

use super::{ProxyResponse, StrategyEngine, entry_from_fetch, response_from_entry, response_from_fetch};

impl StrategyEngine {
    /// Serve from the region when it can; fill it on a miss. A fetch
    /// failure on a miss propagates: there is nothing older to fall back
    /// on.
    pub(crate) async fn cache_first(
        &self, region: &RegionId, identity: &RequestIdentity,
    ) -> Result<ProxyResponse, Error> {
        let slot = identity.slot_key();

        if let Some(entry) = self.store.get_entry(region, &slot).await? {
            tracing::debug!(region = %region, url = %identity.cache_url(), "cache hit");
            return Ok(response_from_entry(entry));
        }

        let fetched = self.backend.fetch(identity.method(), identity.request_url()).await?;
        self.store.put_entry(region, &slot, &entry_from_fetch(identity, &fetched)).await?;
        tracing::debug!(region = %region, url = %identity.cache_url(), "miss filled from network");
        Ok(response_from_fetch(fetched))
    }
}
