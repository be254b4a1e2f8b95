use pkg_constants::network::ENDPOINT_PREFIX_LENGTH;
use pkg_hcn::{Error, ObjectKind, Result};
use pkg_types::endpoint::{EndpointFlags, EndpointInfo, EndpointPolicy, HostEndpoint, IpConfig};
use pkg_types::validate::{validate_ip, validate_mac_address};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::hns::Hns;

impl Hns {
    pub async fn get_endpoint_by_id(&self, id: &str) -> Result<EndpointInfo> {
        let endpoint = self.api.get_endpoint_by_id(id).await?;
        Ok(EndpointInfo::from(&endpoint))
    }

    pub async fn get_endpoint_by_name(&self, name: &str) -> Result<EndpointInfo> {
        let endpoint = self.api.get_endpoint_by_name(name).await?;
        Ok(EndpointInfo::from(&endpoint))
    }

    /// Find the endpoint holding `ip` inside the named network.
    pub async fn get_endpoint_by_ip_address(
        &self,
        ip: &str,
        network_name: &str,
    ) -> Result<EndpointInfo> {
        let network = self.get_network_by_name(network_name).await?;
        let endpoints = self.api.list_endpoints_of_network(&network.id).await?;
        endpoints
            .iter()
            .find(|ep| ep.ip_address() == Some(ip))
            .map(EndpointInfo::from)
            .ok_or_else(|| Error::not_found(ObjectKind::Endpoint, ip))
    }

    /// All endpoints of the named network, keyed by IP address.
    pub async fn get_all_endpoints_by_network(
        &self,
        network_name: &str,
    ) -> Result<HashMap<String, EndpointInfo>> {
        let network = self.get_network_by_name(network_name).await?;
        let endpoints = self.api.list_endpoints_of_network(&network.id).await?;
        let mut by_ip = HashMap::new();
        for ep in &endpoints {
            if ep.ip_address().is_none() {
                continue;
            }
            let info = EndpointInfo::from(ep);
            by_ip.entry(info.ip.clone()).or_insert(info);
        }
        Ok(by_ip)
    }

    /// Create a host endpoint for `endpoint` inside the named network.
    ///
    /// Every call creates a new host object; use [`Hns::ensure_endpoint`] to
    /// reuse an existing one.
    pub async fn create_endpoint(
        &self,
        endpoint: &EndpointInfo,
        network_name: &str,
    ) -> Result<EndpointInfo> {
        validate_ip(&endpoint.ip).map_err(|e| Error::Invalid(e.to_string()))?;
        validate_mac_address(&endpoint.mac_address).map_err(|e| Error::Invalid(e.to_string()))?;

        let mut request = HostEndpoint {
            name: endpoint.name.clone(),
            ip_configurations: vec![IpConfig {
                ip_address: endpoint.ip.clone(),
                prefix_length: ENDPOINT_PREFIX_LENGTH,
            }],
            mac_address: endpoint.mac_address.clone(),
            ..Default::default()
        };
        if !endpoint.is_local {
            let provider_address = endpoint
                .provider_address
                .as_deref()
                .filter(|pa| !pa.is_empty())
                .ok_or_else(|| {
                    Error::Invalid(format!(
                        "remote endpoint {} has no provider address",
                        endpoint.ip
                    ))
                })?;
            validate_ip(provider_address).map_err(|e| Error::Invalid(e.to_string()))?;
            request.flags = EndpointFlags {
                remote_endpoint: true,
            };
            request.policies.push(EndpointPolicy::ProviderAddress {
                provider_address: provider_address.to_string(),
            });
        }

        let network = self.get_network_by_name(network_name).await?;
        let created = self.api.create_endpoint(&network.id, &request).await?;
        info!(
            "Created {} endpoint {} for {} in network {}",
            if endpoint.is_local { "local" } else { "remote" },
            created.id,
            endpoint.ip,
            network_name
        );
        Ok(EndpointInfo::from(&created))
    }

    /// Resolve `endpoint` by host ID, then by IP; create it only on a confirmed miss.
    ///
    /// An endpoint found by IP is reused as is, even if its locality or
    /// provider address differs from `endpoint`; the mismatch is logged.
    /// Not atomic: concurrent callers for the same IP must serialize around it.
    pub async fn ensure_endpoint(
        &self,
        endpoint: &EndpointInfo,
        network_name: &str,
    ) -> Result<EndpointInfo> {
        if let Some(id) = &endpoint.hns_id {
            match self.get_endpoint_by_id(id).await {
                Ok(existing) => return Ok(existing),
                Err(e) if e.is_not_found() => {
                    debug!("Endpoint {} for {} is gone, resolving by IP", id, endpoint.ip);
                }
                Err(e) => return Err(e),
            }
        }
        match self.get_endpoint_by_ip_address(&endpoint.ip, network_name).await {
            Ok(existing) => {
                if existing.is_local != endpoint.is_local
                    || existing.provider_address != endpoint.provider_address
                {
                    warn!(
                        "Reusing endpoint {:?} for {} (local={}, pa={:?}), wanted ({}, {:?})",
                        existing.hns_id,
                        endpoint.ip,
                        existing.is_local,
                        existing.provider_address,
                        endpoint.is_local,
                        endpoint.provider_address
                    );
                }
                Ok(existing)
            }
            Err(e) if e.is_not_found() => self.create_endpoint(endpoint, network_name).await,
            Err(e) => Err(e),
        }
    }

    pub async fn delete_endpoint(&self, id: &str) -> Result<()> {
        self.api.delete_endpoint(id).await?;
        info!("Deleted endpoint {}", id);
        Ok(())
    }
}
