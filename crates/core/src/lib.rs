//! Core types and shared functionality for ranger.
//!
//! This crate provides:
//! - Region store with SQLite backend
//! - Request identities and slot keys
//! - Unified error types
//! - Configuration structures

pub mod config;
pub mod error;
pub mod identity;
pub mod store;

pub use config::{AppConfig, ConfigError, Profile};
pub use error::Error;
pub use identity::{QueryMode, RequestIdentity};
pub use store::{CachedResponse, RegionId, RegionRecord, RegionStore};
