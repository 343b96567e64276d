//! Request-interception caching proxy for ranger.
//!
//! This crate provides:
//! - Route classification over configured host and path rules
//! - Caching strategies (network-only, cache-first, network-first,
//!   stale-while-revalidate)
//! - Update signals and control commands for attached instances
//! - The install/activate lifecycle with versioned region eviction

pub mod lifecycle;
pub mod notify;
pub mod proxy;
pub mod routes;
pub mod strategy;

#[cfg(test)]
pub(crate) mod testutil;

pub use lifecycle::{LifecycleManager, LifecycleState};
pub use notify::{ChangeNotifier, ControlCommand, InstanceHub, InstanceId, UpdateSignal};
pub use proxy::Proxy;
pub use routes::{RouteClass, RouteTable};
pub use strategy::{ProxyRequest, ProxyResponse, ResponseSource, StrategyEngine, StrategyKind};
