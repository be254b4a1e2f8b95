//! Host network constants.

/// Network type name of an overlay (VXLAN) host network.
pub const NETWORK_TYPE_OVERLAY: &str = "Overlay";

/// Network type name of an L2 bridge host network.
pub const NETWORK_TYPE_L2BRIDGE: &str = "L2Bridge";

/// Default name of the host network that service endpoints live in.
pub const DEFAULT_NETWORK_NAME: &str = "vxlan0";

/// Schema version major number sent with every created host object.
pub const SCHEMA_VERSION_MAJOR: u32 = 2;

/// Schema version minor number sent with every created host object.
pub const SCHEMA_VERSION_MINOR: u32 = 0;

/// Prefix length assigned to endpoint IP configurations.
pub const ENDPOINT_PREFIX_LENGTH: u8 = 24;
