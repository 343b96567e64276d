//! Transport seam between strategies and the network.
//!
//! Strategies reach upstreams through the [`Backend`] trait so tests can
//! substitute a scripted transport for the real client.

use url::Url;

use ranger_core::Error;

use super::{FetchClient, FetchResponse};

/// Transport abstraction over upstream fetches.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    /// Fetch `url` with the given method, buffering the complete body.
    async fn fetch(&self, method: &str, url: &Url) -> Result<FetchResponse, Error>;
}

#[async_trait::async_trait]
impl Backend for FetchClient {
    async fn fetch(&self, method: &str, url: &Url) -> Result<FetchResponse, Error> {
        FetchClient::fetch(self, method, url).await
    }
}
