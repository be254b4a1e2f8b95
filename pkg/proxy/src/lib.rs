//! Host network service (HNS) reconciliation for the service proxy.
//!
//! Maps services onto host networks, endpoints and load balancers. Every
//! operation is a method on [`Hns`]; load-balancing rules are deduplicated
//! through an explicit [`LoadBalancerCache`].

pub mod cache;
pub mod endpoint;
pub mod hns;
pub mod lifecycle;
pub mod load_balancer;
pub mod network;

pub use cache::LoadBalancerCache;
pub use hns::Hns;
pub use lifecycle::TeardownReport;
pub use load_balancer::{LoadBalancerIdentifier, LoadBalancerInfo, LoadBalancerRule};
