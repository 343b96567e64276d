//! Request identity: the cache key for intercepted requests.
//!
//! An identity is the tuple (method, canonical URL, query mode). Identities
//! hash down to a fixed slot key; two requests with the same identity under
//! [`QueryMode::Ignore`] land in the same slot no matter what trailing query
//! parameters they carry.

use sha2::{Digest, Sha256};
use url::Url;

/// Whether the query string participates in the cache key.
///
/// Map tiles are keyed exactly (tile coordinates live in the path and the
/// query is meaningful); shell and data lookups ignore the query so cache
/// busters and tracking parameters do not fragment the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    /// The query string is part of the identity.
    Respect,
    /// The query string is stripped before keying.
    Ignore,
}

/// Identity of a cacheable request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestIdentity {
    method: String,
    url: Url,
    query_mode: QueryMode,
}

impl RequestIdentity {
    /// Build an identity from an already-canonicalized URL.
    ///
    /// The method is uppercased so `get` and `GET` share a slot.
    pub fn new(method: &str, url: Url, query_mode: QueryMode) -> Self {
        Self { method: method.to_ascii_uppercase(), url, query_mode }
    }

    /// The uppercased request method.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The URL exactly as requested (query intact regardless of mode).
    pub fn request_url(&self) -> &Url {
        &self.url
    }

    /// The URL as keyed: under [`QueryMode::Ignore`] the query string is
    /// removed, otherwise identical to the request URL.
    pub fn cache_url(&self) -> Url {
        match self.query_mode {
            QueryMode::Respect => self.url.clone(),
            QueryMode::Ignore => {
                let mut stripped = self.url.clone();
                stripped.set_query(None);
                stripped
            }
        }
    }

    /// Compute the slot key for this identity: SHA-256 over the method and
    /// the keyed URL, hex-encoded.
    pub fn slot_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.method.as_bytes());
        hasher.update(b"\n");
        hasher.update(self.cache_url().as_str().as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_slot_key_stability() {
        let a = RequestIdentity::new("GET", url("https://example.com/parks/zion.json"), QueryMode::Ignore);
        let b = RequestIdentity::new("GET", url("https://example.com/parks/zion.json"), QueryMode::Ignore);
        assert_eq!(a.slot_key(), b.slot_key());
    }

    #[test]
    fn test_ignore_mode_collapses_query() {
        let plain = RequestIdentity::new("GET", url("https://example.com/parks/zion.json"), QueryMode::Ignore);
        let busted = RequestIdentity::new("GET", url("https://example.com/parks/zion.json?ts=1714"), QueryMode::Ignore);
        assert_eq!(plain.slot_key(), busted.slot_key());
    }

    #[test]
    fn test_respect_mode_keeps_query_distinct() {
        let plain = RequestIdentity::new("GET", url("https://tiles.example.com/0/0/0.png"), QueryMode::Respect);
        let busted = RequestIdentity::new("GET", url("https://tiles.example.com/0/0/0.png?style=dark"), QueryMode::Respect);
        assert_ne!(plain.slot_key(), busted.slot_key());
    }

    #[test]
    fn test_method_case_insensitive() {
        let upper = RequestIdentity::new("GET", url("https://example.com/"), QueryMode::Ignore);
        let lower = RequestIdentity::new("get", url("https://example.com/"), QueryMode::Ignore);
        assert_eq!(upper.slot_key(), lower.slot_key());
        assert_eq!(lower.method(), "GET");
    }

    #[test]
    fn test_different_methods_different_slots() {
        let get = RequestIdentity::new("GET", url("https://example.com/parks/zion.json"), QueryMode::Ignore);
        let head = RequestIdentity::new("HEAD", url("https://example.com/parks/zion.json"), QueryMode::Ignore);
        assert_ne!(get.slot_key(), head.slot_key());
    }

    #[test]
    fn test_cache_url_strips_query_only_in_ignore_mode() {
        let ignore = RequestIdentity::new("GET", url("https://example.com/a?b=1"), QueryMode::Ignore);
        assert_eq!(ignore.cache_url().as_str(), "https://example.com/a");
        assert_eq!(ignore.request_url().as_str(), "https://example.com/a?b=1");

        let respect = RequestIdentity::new("GET", url("https://example.com/a?b=1"), QueryMode::Respect);
        assert_eq!(respect.cache_url().as_str(), "https://example.com/a?b=1");
    }

    #[test]
    fn test_slot_key_format() {
        let id = RequestIdentity::new("GET", url("https://example.com/"), QueryMode::Ignore);
        let key = id.slot_key();
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
