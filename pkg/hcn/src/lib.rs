//! Seam to the host network control plane.
//!
//! [`HostNetworkApi`] is the fixed capability set the proxy needs: query,
//! create and delete networks' endpoints and load balancers.
//! [`InMemoryHcn`] is a deterministic implementation of it.

pub mod api;
pub mod error;
pub mod fake;

pub use api::HostNetworkApi;
pub use error::{Error, ObjectKind, Result};
pub use fake::InMemoryHcn;
