use serde::{Deserialize, Serialize};

use crate::load_balancer::Protocol;

/// Proxy configuration file (YAML).
///
/// Example `proxy-config.yaml`:
/// ```yaml
/// network-name: vxlan0
/// source-vip: 10.0.0.254
/// services:
///   - name: web
///     vip: 11.0.0.1
///     protocol: TCP
///     port: 80
///     target-port: 8080
///     backends:
///       - ip: 10.0.0.1
///         mac: 00-11-22-33-44-55
///       - ip: 10.0.1.7
///         mac: 00-11-22-33-44-66
///         provider-address: 192.168.0.12
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxyConfigFile {
    #[serde(default, alias = "network-name")]
    pub network_name: Option<String>,
    #[serde(default, alias = "source-vip")]
    pub source_vip: Option<String>,
    #[serde(default, alias = "enable-dsr")]
    pub enable_dsr: bool,
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
}

/// One service to program on the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub vip: String,
    #[serde(default = "default_protocol")]
    pub protocol: Protocol,
    pub port: u16,
    #[serde(alias = "target-port")]
    pub target_port: u16,
    #[serde(default)]
    pub backends: Vec<BackendConfig>,
}

/// A backend of a service. Backends with a provider address live on another node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub ip: String,
    pub mac: String,
    #[serde(default, alias = "provider-address")]
    pub provider_address: Option<String>,
}

fn default_protocol() -> Protocol {
    Protocol::Tcp
}

/// Load a YAML config file, returning the default if the file doesn't exist.
pub fn load_config_file<T: serde::de::DeserializeOwned + Default>(path: &str) -> anyhow::Result<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(T::default());
        }
        Err(e) => return Err(e.into()),
    };
    let config: T = serde_yaml::from_str(&content)?;
    Ok(config)
}
