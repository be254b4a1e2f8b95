use serde::{Deserialize, Serialize};

use crate::SchemaVersion;

/// One IP configuration of a host endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IpConfig {
    pub ip_address: String,
    #[serde(default)]
    pub prefix_length: u8,
}

/// A policy attached to a host endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "Type", content = "Settings")]
pub enum EndpointPolicy {
    /// Underlay address of the node hosting a remote endpoint.
    ProviderAddress {
        #[serde(rename = "ProviderAddress")]
        provider_address: String,
    },
    /// Encapsulation overhead the host applies on overlay networks.
    EncapOverhead {
        #[serde(rename = "Overhead")]
        overhead: u16,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EndpointFlags {
    #[serde(default)]
    pub remote_endpoint: bool,
}

/// An endpoint object as stored by the host network service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostEndpoint {
    /// Host-assigned ID; empty until the host creates the object.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// ID of the network the endpoint lives in.
    #[serde(default)]
    pub host_compute_network: String,
    #[serde(default)]
    pub ip_configurations: Vec<IpConfig>,
    #[serde(default)]
    pub mac_address: String,
    #[serde(default)]
    pub policies: Vec<EndpointPolicy>,
    #[serde(default)]
    pub flags: EndpointFlags,
    #[serde(default)]
    pub schema_version: SchemaVersion,
}

impl HostEndpoint {
    /// The primary IP address of the endpoint, if it has one.
    pub fn ip_address(&self) -> Option<&str> {
        self.ip_configurations
            .first()
            .map(|cfg| cfg.ip_address.as_str())
    }

    pub fn provider_address(&self) -> Option<&str> {
        self.policies.iter().find_map(|policy| match policy {
            EndpointPolicy::ProviderAddress { provider_address } => Some(provider_address.as_str()),
            _ => None,
        })
    }

    pub fn is_remote(&self) -> bool {
        self.flags.remote_endpoint
    }
}

/// Proxy-side view of one backend endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointInfo {
    pub ip: String,
    pub mac_address: String,
    /// Host-assigned ID, `None` until the endpoint has been created.
    #[serde(default)]
    pub hns_id: Option<String>,
    #[serde(default)]
    pub name: String,
    pub is_local: bool,
    /// Underlay address for remote endpoints.
    #[serde(default)]
    pub provider_address: Option<String>,
}

impl EndpointInfo {
    /// A backend running on this host.
    pub fn local(ip: &str, mac_address: &str) -> Self {
        Self {
            ip: ip.to_string(),
            mac_address: mac_address.to_string(),
            hns_id: None,
            name: String::new(),
            is_local: true,
            provider_address: None,
        }
    }

    /// A backend on another node, reached through `provider_address`.
    pub fn remote(ip: &str, mac_address: &str, provider_address: &str) -> Self {
        Self {
            ip: ip.to_string(),
            mac_address: mac_address.to_string(),
            hns_id: None,
            name: String::new(),
            is_local: false,
            provider_address: Some(provider_address.to_string()),
        }
    }
}

impl From<&HostEndpoint> for EndpointInfo {
    fn from(endpoint: &HostEndpoint) -> Self {
        Self {
            ip: endpoint.ip_address().unwrap_or_default().to_string(),
            mac_address: endpoint.mac_address.clone(),
            hns_id: Some(endpoint.id.clone()),
            name: endpoint.name.clone(),
            is_local: !endpoint.is_remote(),
            provider_address: endpoint.provider_address().map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote_endpoint() -> HostEndpoint {
        HostEndpoint {
            id: "EP-1".to_string(),
            ip_configurations: vec![IpConfig {
                ip_address: "192.168.2.3".to_string(),
                prefix_length: 24,
            }],
            mac_address: "00-11-22-33-44-55".to_string(),
            policies: vec![
                EndpointPolicy::EncapOverhead { overhead: 50 },
                EndpointPolicy::ProviderAddress {
                    provider_address: "10.0.0.3".to_string(),
                },
            ],
            flags: EndpointFlags {
                remote_endpoint: true,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_policy_wire_format() {
        let policy = EndpointPolicy::ProviderAddress {
            provider_address: "10.0.0.3".to_string(),
        };
        let json = serde_json::to_string(&policy).unwrap();
        assert_eq!(
            json,
            r#"{"Type":"ProviderAddress","Settings":{"ProviderAddress":"10.0.0.3"}}"#
        );
    }

    #[test]
    fn test_info_from_remote_host_endpoint() {
        let info = EndpointInfo::from(&remote_endpoint());
        assert_eq!(info.ip, "192.168.2.3");
        assert_eq!(info.hns_id.as_deref(), Some("EP-1"));
        assert!(!info.is_local);
        assert_eq!(info.provider_address.as_deref(), Some("10.0.0.3"));
    }

    #[test]
    fn test_info_from_local_host_endpoint() {
        let mut endpoint = remote_endpoint();
        endpoint.flags = EndpointFlags::default();
        endpoint.policies.clear();

        let info = EndpointInfo::from(&endpoint);
        assert!(info.is_local);
        assert!(info.provider_address.is_none());
    }

    #[test]
    fn test_endpoint_without_ip_config() {
        let endpoint = HostEndpoint {
            id: "EP-2".to_string(),
            ..Default::default()
        };
        assert!(endpoint.ip_address().is_none());
        assert_eq!(EndpointInfo::from(&endpoint).ip, "");
    }
}
