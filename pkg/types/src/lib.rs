pub mod config;
pub mod endpoint;
pub mod load_balancer;
pub mod network;
pub mod validate;

use pkg_constants::network::{SCHEMA_VERSION_MAJOR, SCHEMA_VERSION_MINOR};
use serde::{Deserialize, Serialize};

/// Schema version stamped on host objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self {
            major: SCHEMA_VERSION_MAJOR,
            minor: SCHEMA_VERSION_MINOR,
        }
    }
}
