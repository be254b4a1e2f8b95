use serde::{Deserialize, Serialize};

use crate::SchemaVersion;

/// Transport protocol of a load-balancing rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    /// IANA protocol number, as the host expects it.
    pub fn number(self) -> u16 {
        match self {
            Protocol::Tcp => 6,
            Protocol::Udp => 17,
        }
    }

    pub fn from_number(number: u16) -> Option<Self> {
        match number {
            6 => Some(Protocol::Tcp),
            17 => Some(Protocol::Udp),
            _ => None,
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "TCP"),
            Protocol::Udp => write!(f, "UDP"),
        }
    }
}

/// Proxy-side behaviour switches for a load-balancing rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancerFlags {
    #[serde(default)]
    pub is_ilb: bool,
    #[serde(default)]
    pub is_dsr: bool,
    #[serde(default)]
    pub local_routed_vip: bool,
    #[serde(default)]
    pub use_mux: bool,
    #[serde(default)]
    pub preserve_dip: bool,
    #[serde(default)]
    pub session_affinity: bool,
    #[serde(default)]
    pub is_ipv6: bool,
}

impl LoadBalancerFlags {
    pub fn host_flags(&self) -> HostLoadBalancerFlags {
        HostLoadBalancerFlags {
            enable_direct_server_return: self.is_dsr,
            ipv6: self.is_ipv6,
        }
    }

    pub fn port_mapping_flags(&self) -> PortMappingFlags {
        PortMappingFlags {
            ilb: self.is_ilb,
            local_routed_vip: self.local_routed_vip,
            use_mux: self.use_mux,
            preserve_dip: self.preserve_dip,
        }
    }

    pub fn distribution(&self) -> DistributionType {
        if self.session_affinity {
            DistributionType::SourceIp
        } else {
            DistributionType::None
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostLoadBalancerFlags {
    #[serde(default)]
    pub enable_direct_server_return: bool,
    #[serde(default, rename = "IPv6")]
    pub ipv6: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PortMappingFlags {
    #[serde(default, rename = "ILB")]
    pub ilb: bool,
    #[serde(default, rename = "LocalRoutedVIP")]
    pub local_routed_vip: bool,
    #[serde(default)]
    pub use_mux: bool,
    #[serde(default, rename = "PreserveDIP")]
    pub preserve_dip: bool,
}

/// How the host spreads flows across the backend set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistributionType {
    /// 5-tuple hashing.
    #[default]
    None,
    SourceIp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PortMapping {
    /// IANA protocol number.
    pub protocol: u16,
    pub internal_port: u16,
    pub external_port: u16,
    #[serde(default)]
    pub distribution_type: DistributionType,
    #[serde(default)]
    pub flags: PortMappingFlags,
}

/// A load-balancing rule as stored by the host network service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostLoadBalancer {
    /// Host-assigned ID; empty until the host creates the object.
    #[serde(default)]
    pub id: String,
    /// IDs of the backend endpoints.
    #[serde(default)]
    pub host_compute_endpoints: Vec<String>,
    #[serde(default, rename = "SourceVIP")]
    pub source_vip: String,
    #[serde(default, rename = "FrontendVIPs")]
    pub frontend_vips: Vec<String>,
    #[serde(default)]
    pub port_mappings: Vec<PortMapping>,
    #[serde(default)]
    pub flags: HostLoadBalancerFlags,
    #[serde(default)]
    pub schema_version: SchemaVersion,
}
