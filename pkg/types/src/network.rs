use pkg_constants::network::{NETWORK_TYPE_L2BRIDGE, NETWORK_TYPE_OVERLAY};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkType {
    Overlay,
    L2Bridge,
}

impl std::fmt::Display for NetworkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkType::Overlay => write!(f, "{}", NETWORK_TYPE_OVERLAY),
            NetworkType::L2Bridge => write!(f, "{}", NETWORK_TYPE_L2BRIDGE),
        }
    }
}

/// A virtual network as reported by the host network service.
/// Networks are created out-of-band and never mutated by the proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostNetwork {
    pub id: String,
    pub name: String,
    #[serde(rename = "Type")]
    pub network_type: NetworkType,
}

/// Proxy-side view of a host network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInfo {
    pub id: String,
    pub name: String,
    pub network_type: NetworkType,
}

impl From<HostNetwork> for NetworkInfo {
    fn from(network: HostNetwork) -> Self {
        Self {
            id: network.id,
            name: network.name,
            network_type: network.network_type,
        }
    }
}
