//! Network-first with cache fallback.

use ranger_core::{Error, RegionId, RequestIdentity};

use super::{ProxyResponse, StrategyEngine, entry_from_fetch, response_from_entry, response_from_fetch};

impl StrategyEngine {
    /// Ask the network first; a successful answer refreshes the region.
    /// On a fetch failure fall back to whatever the region holds, and
    /// propagate the failure only when it holds nothing.
    pub(crate) async fn network_first(
        &self, region: &RegionId, identity: &RequestIdentity,
    ) -> Result<ProxyResponse, Error> {
        let slot = identity.slot_key();

        match self.backend.fetch(identity.method(), identity.request_url()).await {
            Ok(fetched) => {
                self.store.put_entry(region, &slot, &entry_from_fetch(identity, &fetched)).await?;
                Ok(response_from_fetch(fetched))
            }
            Err(e) if e.is_fetch_failure() => {
                tracing::debug!(region = %region, error = %e, "network failed; trying cache");
                match self.store.get_entry(region, &slot).await? {
                    Some(entry) => Ok(response_from_entry(entry)),
                    None => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }
}
