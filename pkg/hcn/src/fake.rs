//! Deterministic in-memory host network service.
//!
//! Behaves like the real control plane as far as the proxy can observe:
//! objects get host-assigned IDs, endpoints must live in an existing network,
//! load balancers must reference existing endpoints, and an endpoint cannot
//! be deleted while a load balancer still references it. IDs are GUID-shaped
//! and allocated sequentially so test runs are reproducible.

use async_trait::async_trait;
use dashmap::DashMap;
use pkg_types::SchemaVersion;
use pkg_types::endpoint::{EndpointPolicy, HostEndpoint};
use pkg_types::load_balancer::HostLoadBalancer;
use pkg_types::network::{HostNetwork, NetworkType};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::api::HostNetworkApi;
use crate::error::{Error, ObjectKind, Result};

/// Encapsulation overhead the host attaches to endpoints on overlay networks.
const OVERLAY_ENCAP_OVERHEAD: u16 = 50;

pub struct InMemoryHcn {
    /// name → network
    networks: DashMap<String, HostNetwork>,
    /// id → endpoint
    endpoints: DashMap<String, HostEndpoint>,
    /// id → load balancer
    load_balancers: DashMap<String, HostLoadBalancer>,
    next_id: AtomicU64,
    endpoint_creates: AtomicUsize,
    load_balancer_creates: AtomicUsize,
    /// Simulated control-plane round trip applied to every call.
    latency: Duration,
    unavailable: AtomicBool,
}

impl InMemoryHcn {
    pub fn new() -> Self {
        Self {
            networks: DashMap::new(),
            endpoints: DashMap::new(),
            load_balancers: DashMap::new(),
            next_id: AtomicU64::new(1),
            endpoint_creates: AtomicUsize::new(0),
            load_balancer_creates: AtomicUsize::new(0),
            latency: Duration::ZERO,
            unavailable: AtomicBool::new(false),
        }
    }

    /// Delay every call by `latency`, widening race windows in tests.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Create a network out-of-band, the way an operator or CNI would.
    pub fn add_network(&self, name: &str, network_type: NetworkType) -> HostNetwork {
        let network = HostNetwork {
            id: self.allocate_id(),
            name: name.to_string(),
            network_type,
        };
        self.networks.insert(name.to_string(), network.clone());
        network
    }

    /// While set, every call fails with [`Error::Api`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of successful `create_endpoint` calls so far.
    pub fn endpoint_create_calls(&self) -> usize {
        self.endpoint_creates.load(Ordering::SeqCst)
    }

    /// Number of successful `create_load_balancer` calls so far.
    pub fn load_balancer_create_calls(&self) -> usize {
        self.load_balancer_creates.load(Ordering::SeqCst)
    }

    fn allocate_id(&self) -> String {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        Uuid::from_u128(n as u128).to_string().to_uppercase()
    }

    async fn round_trip(&self) -> Result<()> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::Api("host network service unavailable".to_string()));
        }
        Ok(())
    }

    fn sorted<T: Clone>(map: &DashMap<String, T>) -> Vec<T> {
        let mut entries: Vec<(String, T)> = map
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.into_iter().map(|(_, v)| v).collect()
    }
}

impl Default for InMemoryHcn {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostNetworkApi for InMemoryHcn {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn get_network_by_name(&self, name: &str) -> Result<HostNetwork> {
        self.round_trip().await?;
        self.networks
            .get(name)
            .map(|n| n.clone())
            .ok_or_else(|| Error::not_found(ObjectKind::Network, name))
    }

    async fn list_endpoints_of_network(&self, network_id: &str) -> Result<Vec<HostEndpoint>> {
        self.round_trip().await?;
        Ok(Self::sorted(&self.endpoints)
            .into_iter()
            .filter(|ep| ep.host_compute_network == network_id)
            .collect())
    }

    async fn get_endpoint_by_id(&self, id: &str) -> Result<HostEndpoint> {
        self.round_trip().await?;
        self.endpoints
            .get(id)
            .map(|ep| ep.clone())
            .ok_or_else(|| Error::not_found(ObjectKind::Endpoint, id))
    }

    async fn get_endpoint_by_name(&self, name: &str) -> Result<HostEndpoint> {
        self.round_trip().await?;
        Self::sorted(&self.endpoints)
            .into_iter()
            .find(|ep| !ep.name.is_empty() && ep.name == name)
            .ok_or_else(|| Error::not_found(ObjectKind::Endpoint, name))
    }

    async fn list_endpoints(&self) -> Result<Vec<HostEndpoint>> {
        self.round_trip().await?;
        Ok(Self::sorted(&self.endpoints))
    }

    async fn get_load_balancer_by_id(&self, id: &str) -> Result<HostLoadBalancer> {
        self.round_trip().await?;
        self.load_balancers
            .get(id)
            .map(|lb| lb.clone())
            .ok_or_else(|| Error::not_found(ObjectKind::LoadBalancer, id))
    }

    async fn list_load_balancers(&self) -> Result<Vec<HostLoadBalancer>> {
        self.round_trip().await?;
        Ok(Self::sorted(&self.load_balancers))
    }

    async fn create_endpoint(
        &self,
        network_id: &str,
        endpoint: &HostEndpoint,
    ) -> Result<HostEndpoint> {
        self.round_trip().await?;
        let network_type = self
            .networks
            .iter()
            .find(|n| n.id == network_id)
            .map(|n| n.network_type)
            .ok_or_else(|| Error::not_found(ObjectKind::Network, network_id))?;

        let mut created = endpoint.clone();
        created.id = self.allocate_id();
        created.host_compute_network = network_id.to_string();
        created.schema_version = SchemaVersion::default();
        if network_type == NetworkType::Overlay
            && !created
                .policies
                .iter()
                .any(|p| matches!(p, EndpointPolicy::EncapOverhead { .. }))
        {
            created.policies.push(EndpointPolicy::EncapOverhead {
                overhead: OVERLAY_ENCAP_OVERHEAD,
            });
        }

        self.endpoints.insert(created.id.clone(), created.clone());
        self.endpoint_creates.fetch_add(1, Ordering::SeqCst);
        debug!("in-memory hcn: created endpoint {}", created.id);
        Ok(created)
    }

    async fn create_load_balancer(
        &self,
        load_balancer: &HostLoadBalancer,
    ) -> Result<HostLoadBalancer> {
        self.round_trip().await?;
        if let Some(missing) = load_balancer
            .host_compute_endpoints
            .iter()
            .find(|id| !self.endpoints.contains_key(id.as_str()))
        {
            return Err(Error::Api(format!(
                "load balancer references unknown endpoint {}",
                missing
            )));
        }

        let mut created = load_balancer.clone();
        created.id = self.allocate_id();
        created.schema_version = SchemaVersion::default();

        self.load_balancers
            .insert(created.id.clone(), created.clone());
        self.load_balancer_creates.fetch_add(1, Ordering::SeqCst);
        debug!("in-memory hcn: created load balancer {}", created.id);
        Ok(created)
    }

    async fn delete_endpoint(&self, id: &str) -> Result<()> {
        self.round_trip().await?;
        if !self.endpoints.contains_key(id) {
            return Err(Error::not_found(ObjectKind::Endpoint, id));
        }
        if let Some(lb) = self
            .load_balancers
            .iter()
            .find(|lb| lb.host_compute_endpoints.iter().any(|ep| ep == id))
        {
            return Err(Error::Api(format!(
                "endpoint {} is still referenced by load balancer {}",
                id,
                lb.key()
            )));
        }
        self.endpoints.remove(id);
        Ok(())
    }

    async fn delete_load_balancer(&self, id: &str) -> Result<()> {
        self.round_trip().await?;
        self.load_balancers
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(ObjectKind::LoadBalancer, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkg_types::endpoint::IpConfig;

    fn endpoint(ip: &str) -> HostEndpoint {
        HostEndpoint {
            ip_configurations: vec![IpConfig {
                ip_address: ip.to_string(),
                prefix_length: 24,
            }],
            mac_address: "00-11-22-33-44-55".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_ids_are_sequential_guids() {
        let hcn = InMemoryHcn::new();
        let network = hcn.add_network("TestOverlay", NetworkType::Overlay);
        assert_eq!(network.id, "00000000-0000-0000-0000-000000000001");

        let ep = hcn.create_endpoint(&network.id, &endpoint("192.168.1.3")).await.unwrap();
        assert_eq!(ep.id, "00000000-0000-0000-0000-000000000002");
        assert_eq!(ep.host_compute_network, network.id);
        assert_eq!(hcn.endpoint_create_calls(), 1);
    }

    #[tokio::test]
    async fn test_overlay_endpoints_get_encap_overhead() {
        let hcn = InMemoryHcn::new();
        let overlay = hcn.add_network("overlay", NetworkType::Overlay);
        let bridge = hcn.add_network("bridge", NetworkType::L2Bridge);

        let ep = hcn.create_endpoint(&overlay.id, &endpoint("192.168.1.3")).await.unwrap();
        assert_eq!(
            ep.policies,
            vec![EndpointPolicy::EncapOverhead { overhead: 50 }]
        );

        let ep = hcn.create_endpoint(&bridge.id, &endpoint("192.168.1.4")).await.unwrap();
        assert!(ep.policies.is_empty());
    }

    #[tokio::test]
    async fn test_create_endpoint_in_unknown_network() {
        let hcn = InMemoryHcn::new();
        let err = hcn.create_endpoint("nope", &endpoint("192.168.1.3")).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(hcn.endpoint_create_calls(), 0);
    }

    #[tokio::test]
    async fn test_referenced_endpoint_cannot_be_deleted() {
        let hcn = InMemoryHcn::new();
        let network = hcn.add_network("TestOverlay", NetworkType::Overlay);
        let ep = hcn.create_endpoint(&network.id, &endpoint("192.168.1.3")).await.unwrap();
        let lb = hcn
            .create_load_balancer(&HostLoadBalancer {
                host_compute_endpoints: vec![ep.id.clone()],
                ..Default::default()
            })
            .await
            .unwrap();

        let err = hcn.delete_endpoint(&ep.id).await.unwrap_err();
        assert!(matches!(err, Error::Api(_)));

        hcn.delete_load_balancer(&lb.id).await.unwrap();
        hcn.delete_endpoint(&ep.id).await.unwrap();
        assert!(hcn.get_endpoint_by_id(&ep.id).await.unwrap_err().is_not_found());
        assert!(hcn.delete_endpoint(&ep.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_load_balancer_requires_known_endpoints() {
        let hcn = InMemoryHcn::new();
        let err = hcn
            .create_load_balancer(&HostLoadBalancer {
                host_compute_endpoints: vec!["missing".to_string()],
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Api(_)));
        assert_eq!(hcn.load_balancer_create_calls(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_host() {
        let hcn = InMemoryHcn::new();
        hcn.add_network("TestOverlay", NetworkType::Overlay);
        hcn.set_unavailable(true);
        let err = hcn.get_network_by_name("TestOverlay").await.unwrap_err();
        assert!(matches!(err, Error::Api(_)));

        hcn.set_unavailable(false);
        assert!(hcn.get_network_by_name("TestOverlay").await.is_ok());
    }
}
