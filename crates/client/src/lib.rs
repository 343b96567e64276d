//! Client code for ranger.
//!
//! This crate provides the HTTP fetch pipeline strategies use to reach
//! upstream hosts, and the transport seam tests substitute for it.

pub mod fetch;

pub use fetch::{Backend, FetchClient, FetchConfig, FetchResponse, canonicalize};
