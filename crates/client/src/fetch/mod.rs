//! HTTP fetch pipeline for upstream requests.
//!
//! ### URL Canonicalization
//! - Trim whitespace, ensure scheme (default: `https`)
//! - Remove fragments
//! - Preserve query string
//!
//! ### Limits
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)
//! - Request timeout: 20s (configurable)
//!
//! Responses are buffered in full before being returned. Strategies store
//! and serve complete bodies, never streams, so a cached entry is always
//! whole.

pub mod backend;
pub mod url;

use bytes::Bytes;
use reqwest::Url;
use reqwest::{Client, Method, header};
use std::time::{Duration, Instant};

pub use backend::Backend;
pub use url::{UrlError, canonicalize};

use ranger_core::{AppConfig, Error};

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "ranger/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "ranger/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl FetchConfig {
    /// Derive fetch settings from the application configuration.
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// Response from a fetch operation.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The URL requested
    pub url: Url,
    /// The final URL after redirects
    pub final_url: Url,
    /// HTTP status code
    pub status: u16,
    /// Content-Type header
    pub content_type: Option<String>,
    /// Response body bytes
    pub bytes: Bytes,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

/// HTTP client for talking to upstream hosts.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::NetworkUnavailable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Fetch a URL, returning the complete body and metadata.
    ///
    /// Transport failures and non-success statuses both come back as
    /// errors: a response that reaches the caller is a 2xx with its whole
    /// body in memory, fit to cache.
    pub async fn fetch(&self, method: &str, url: &Url) -> Result<FetchResponse, Error> {
        let start = Instant::now();

        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| Error::InvalidInput(format!("invalid method: {method}")))?;

        let response = self
            .http
            .request(method, url.clone())
            .send()
            .await
            .map_err(|e| Error::NetworkUnavailable(format!("network error: {}", e)))?;

        let status = response.status();

        if !status.is_success() {
            return Err(Error::UpstreamStatus(status.as_u16()));
        }

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let final_url = response.url().clone();

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::NetworkUnavailable(format!("failed to read response: {}", e)))?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", bytes.len(), self.config.max_bytes)));
        }

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!("fetched {} -> {} in {}ms ({} bytes)", url, final_url, fetch_ms, bytes.len());

        Ok(FetchResponse { url: url.clone(), final_url, status: status.as_u16(), content_type, bytes, fetch_ms })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "ranger/0.1");
        assert_eq!(config.max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.timeout, Duration::from_millis(20000));
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_from_app_config() {
        let app = AppConfig { user_agent: "ranger-test/9".into(), max_bytes: 1024, timeout_ms: 500, ..Default::default() };
        let config = FetchConfig::from_app_config(&app);
        assert_eq!(config.user_agent, "ranger-test/9");
        assert_eq!(config.max_bytes, 1024);
        assert_eq!(config.timeout, Duration::from_millis(500));
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_fetch_response_fields() {
        let response = FetchResponse {
            url: Url::parse("https://example.com").unwrap(),
            final_url: Url::parse("https://example.com/redirected").unwrap(),
            status: 200,
            content_type: Some("application/json".to_string()),
            bytes: Bytes::from_static(b"{}"),
            fetch_ms: 100,
        };

        assert_eq!(response.url.as_str(), "https://example.com/");
        assert_eq!(response.final_url.as_str(), "https://example.com/redirected");
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type, Some("application/json".to_string()));
        assert_eq!(response.bytes.as_ref(), b"{}");
    }

    #[tokio::test]
    async fn test_fetch_client_new() {
        let client = FetchClient::new(FetchConfig::default());
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_fetch_rejects_invalid_method() {
        let client = FetchClient::new(FetchConfig::default()).unwrap();
        let url = Url::parse("https://example.com/").unwrap();
        let result = client.fetch("NOT A METHOD", &url).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
