//! Route classification for intercepted requests.
//!
//! Every request URL lands in exactly one of four traffic classes, and the
//! class alone decides which region backs it and how its cache key treats
//! the query string. Classification is pure: no I/O, no side effects.

use ranger_core::{AppConfig, QueryMode};
use url::Url;

/// Region name for precached shell assets.
pub const SHELL_REGION: &str = "shell";
/// Region name for same-origin data documents.
pub const DATA_REGION: &str = "data";
/// Region name for basemap tiles.
pub const TILES_REGION: &str = "tiles";

/// Traffic class of an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    /// Live data (forecasts, elevation queries); always answered by the
    /// network and never cached.
    NetworkOnly,
    /// Basemap tiles; immutable per exact URL.
    Tiles,
    /// Park data documents.
    AppData,
    /// Everything else: the application shell.
    AppShell,
}

impl RouteClass {
    /// Logical name of the region backing this class, `None` when the
    /// class is never cached.
    pub fn region_name(self) -> Option<&'static str> {
        match self {
            RouteClass::NetworkOnly => None,
            RouteClass::Tiles => Some(TILES_REGION),
            RouteClass::AppData => Some(DATA_REGION),
            RouteClass::AppShell => Some(SHELL_REGION),
        }
    }

    /// Whether the query string is significant in this class's cache key.
    ///
    /// Tile URLs carry meaning in their query; shell and data lookups drop
    /// it so cache busters do not fragment the regions.
    pub fn query_mode(self) -> QueryMode {
        match self {
            RouteClass::Tiles => QueryMode::Respect,
            _ => QueryMode::Ignore,
        }
    }
}

/// First-match-wins classification table, built once from configuration.
#[derive(Debug, Clone)]
pub struct RouteTable {
    live_hosts: Vec<String>,
    tile_hosts: Vec<String>,
    data_path_marker: String,
}

impl RouteTable {
    /// Build the table from configuration. Host lists are lowercased to
    /// match the parsed form of request hosts.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            live_hosts: config.live_hosts.iter().map(|h| h.to_lowercase()).collect(),
            tile_hosts: config.tile_hosts.iter().map(|h| h.to_lowercase()).collect(),
            data_path_marker: config.data_path_marker.clone(),
        }
    }

    /// Classify a request URL. Total: every URL falls into exactly one
    /// class, and earlier rules win.
    pub fn classify(&self, url: &Url) -> RouteClass {
        let host = url.host_str().unwrap_or("");

        if self.live_hosts.iter().any(|h| host_matches(host, h)) {
            return RouteClass::NetworkOnly;
        }
        if self.tile_hosts.iter().any(|h| host_matches(host, h)) {
            return RouteClass::Tiles;
        }
        if url.path().contains(self.data_path_marker.as_str()) {
            return RouteClass::AppData;
        }
        RouteClass::AppShell
    }
}

/// Matches the configured host exactly or as a parent domain:
/// `api.example.com` matches `example.com`, `notexample.com` does not.
fn host_matches(host: &str, configured: &str) -> bool {
    host == configured || host.strip_suffix(configured).is_some_and(|rest| rest.ends_with('.'))
}
