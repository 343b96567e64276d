//! SQLite-backed store for cache regions and their entries.
//!
//! This module provides the durable layer behind every caching strategy,
//! using SQLite with async access via tokio-rusqlite. It supports:
//!
//! - Named regions with structural version tags
//! - Verbatim response entries addressed by slot key
//! - Automatic schema migrations
//! - WAL mode for concurrent access

pub mod connection;
pub mod entries;
pub mod migrations;
pub mod regions;

pub use crate::Error;

pub use connection::RegionStore;
pub use entries::CachedResponse;
pub use regions::{RegionId, RegionRecord};
