use pkg_hcn::{Error, Result};
use pkg_types::endpoint::EndpointInfo;
use pkg_types::load_balancer::{HostLoadBalancer, LoadBalancerFlags, PortMapping, Protocol};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::cache::LoadBalancerCache;
use crate::hns::Hns;

/// Identity of a load-balancing rule, used to deduplicate host rules.
///
/// Built from the backend *count*, not the backend set: two rules that differ
/// only in which endpoints they target share an identifier. Flags and the
/// source VIP are not part of it either.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LoadBalancerIdentifier {
    pub protocol: Protocol,
    pub internal_port: u16,
    pub external_port: u16,
    pub vip: String,
    pub endpoints_count: usize,
}

impl LoadBalancerIdentifier {
    pub fn new(
        protocol: Protocol,
        internal_port: u16,
        external_port: u16,
        vip: &str,
        endpoints_count: usize,
    ) -> Self {
        Self {
            protocol,
            internal_port,
            external_port,
            vip: vip.to_string(),
            endpoints_count,
        }
    }

    /// Derive the identifier of an existing host rule. Returns `None` for rules
    /// without a port mapping or with a protocol the proxy never programs.
    pub fn from_host(lb: &HostLoadBalancer) -> Option<Self> {
        let mapping = lb.port_mappings.first()?;
        let protocol = Protocol::from_number(mapping.protocol)?;
        Some(Self {
            protocol,
            internal_port: mapping.internal_port,
            external_port: mapping.external_port,
            vip: lb.frontend_vips.first().cloned().unwrap_or_default(),
            endpoints_count: lb.host_compute_endpoints.len(),
        })
    }
}

impl std::fmt::Display for LoadBalancerIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}:{}->{} ({} endpoints)",
            self.protocol, self.vip, self.external_port, self.internal_port, self.endpoints_count
        )
    }
}

/// Cached knowledge about a host rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadBalancerInfo {
    pub hns_id: String,
}

/// A host rule returned by [`Hns::get_load_balancer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadBalancerRule {
    pub hns_id: String,
    /// The host object as last seen, either just created or just re-read.
    pub host: HostLoadBalancer,
}

impl Hns {
    /// Return the host rule for these parameters, creating it on a cache miss.
    ///
    /// At most one rule is created per identifier and cache: the cache lock is
    /// held from lookup to insert. A cached rule is re-read from the host; if
    /// it has vanished, the entry is evicted and a new rule is created.
    #[allow(clippy::too_many_arguments)]
    pub async fn get_load_balancer(
        &self,
        endpoints: &[EndpointInfo],
        flags: LoadBalancerFlags,
        source_vip: &str,
        vip: &str,
        protocol: Protocol,
        internal_port: u16,
        external_port: u16,
        cache: &LoadBalancerCache,
    ) -> Result<LoadBalancerRule> {
        let id = LoadBalancerIdentifier::new(
            protocol,
            internal_port,
            external_port,
            vip,
            endpoints.len(),
        );
        let endpoint_ids = endpoints
            .iter()
            .map(|ep| {
                ep.hns_id
                    .clone()
                    .ok_or_else(|| Error::Invalid(format!("endpoint {} has no host ID", ep.ip)))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut entries = cache.lock().await;

        if let Some(cached) = entries.get(&id).cloned() {
            match self.api.get_load_balancer_by_id(&cached.hns_id).await {
                Ok(host) => {
                    debug!("Reusing load balancer {} for {}", cached.hns_id, id);
                    return Ok(LoadBalancerRule {
                        hns_id: cached.hns_id,
                        host,
                    });
                }
                Err(e) if e.is_not_found() => {
                    warn!(
                        "Cached load balancer {} for {} no longer exists on the host, recreating",
                        cached.hns_id, id
                    );
                    entries.remove(&id);
                }
                Err(e) => return Err(e),
            }
        }

        let request = HostLoadBalancer {
            host_compute_endpoints: endpoint_ids,
            source_vip: source_vip.to_string(),
            frontend_vips: if vip.is_empty() {
                Vec::new()
            } else {
                vec![vip.to_string()]
            },
            port_mappings: vec![PortMapping {
                protocol: protocol.number(),
                internal_port,
                external_port,
                distribution_type: flags.distribution(),
                flags: flags.port_mapping_flags(),
            }],
            flags: flags.host_flags(),
            ..Default::default()
        };
        let created = self.api.create_load_balancer(&request).await?;
        info!("Created load balancer {} for {}", created.id, id);

        entries.insert(
            id,
            LoadBalancerInfo {
                hns_id: created.id.clone(),
            },
        );
        Ok(LoadBalancerRule {
            hns_id: created.id.clone(),
            host: created,
        })
    }

    /// Delete a host rule. The caller must drop its cache entry in the same step;
    /// [`Hns::delete_cached_load_balancer`] does both.
    pub async fn delete_load_balancer(&self, id: &str) -> Result<()> {
        self.api.delete_load_balancer(id).await?;
        info!("Deleted load balancer {}", id);
        Ok(())
    }

    /// Enumerate host rules keyed by their identifier.
    ///
    /// When several host rules share an identifier only the first one is kept
    /// and the others are reported as duplicates.
    pub async fn get_all_load_balancers(
        &self,
    ) -> Result<HashMap<LoadBalancerIdentifier, LoadBalancerInfo>> {
        let mut by_id: HashMap<LoadBalancerIdentifier, LoadBalancerInfo> = HashMap::new();
        for lb in self.api.list_load_balancers().await? {
            let Some(id) = LoadBalancerIdentifier::from_host(&lb) else {
                debug!("Skipping load balancer {} without a known port mapping", lb.id);
                continue;
            };
            if let Some(existing) = by_id.get(&id) {
                warn!(
                    "Load balancer {} duplicates {} for {}",
                    lb.id, existing.hns_id, id
                );
                continue;
            }
            by_id.insert(id, LoadBalancerInfo { hns_id: lb.id });
        }
        Ok(by_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkg_hcn::{HostNetworkApi, InMemoryHcn};
    use pkg_types::load_balancer::{DistributionType, HostLoadBalancerFlags};
    use pkg_types::network::NetworkType;
    use std::sync::Arc;
    use std::time::Duration;

    const NETWORK: &str = "TestOverlay";
    const SOURCE_VIP: &str = "192.168.1.2";
    const SERVICE_VIP: &str = "11.0.0.1";
    const EP_MAC: &str = "00-11-22-33-44-55";
    const INTERNAL_PORT: u16 = 80;
    const EXTERNAL_PORT: u16 = 32440;

    async fn fixture(latency: Duration) -> (Arc<InMemoryHcn>, Hns, Vec<EndpointInfo>) {
        let hcn = Arc::new(InMemoryHcn::new().with_latency(latency));
        hcn.add_network(NETWORK, NetworkType::Overlay);
        let hns = Hns::new(hcn.clone());
        let ep = hns
            .create_endpoint(&EndpointInfo::local("192.168.1.3", EP_MAC), NETWORK)
            .await
            .unwrap();
        (hcn, hns, vec![ep])
    }

    async fn get(
        hns: &Hns,
        endpoints: &[EndpointInfo],
        cache: &LoadBalancerCache,
    ) -> Result<LoadBalancerRule> {
        hns.get_load_balancer(
            endpoints,
            LoadBalancerFlags::default(),
            SOURCE_VIP,
            SERVICE_VIP,
            Protocol::Tcp,
            INTERNAL_PORT,
            EXTERNAL_PORT,
            cache,
        )
        .await
    }

    #[test]
    fn test_identifier_determinism() {
        let base = LoadBalancerIdentifier::new(Protocol::Tcp, 80, 32440, "11.0.0.1", 2);
        assert_eq!(
            base,
            LoadBalancerIdentifier::new(Protocol::Tcp, 80, 32440, "11.0.0.1", 2)
        );

        let variants = [
            LoadBalancerIdentifier::new(Protocol::Udp, 80, 32440, "11.0.0.1", 2),
            LoadBalancerIdentifier::new(Protocol::Tcp, 81, 32440, "11.0.0.1", 2),
            LoadBalancerIdentifier::new(Protocol::Tcp, 80, 32441, "11.0.0.1", 2),
            LoadBalancerIdentifier::new(Protocol::Tcp, 80, 32440, "11.0.0.2", 2),
            LoadBalancerIdentifier::new(Protocol::Tcp, 80, 32440, "11.0.0.1", 3),
        ];
        for variant in &variants {
            assert_ne!(&base, variant);
        }

        let mut map = HashMap::new();
        map.insert(base.clone(), 1);
        map.insert(
            LoadBalancerIdentifier::new(Protocol::Tcp, 80, 32440, "11.0.0.1", 2),
            2,
        );
        assert_eq!(map.len(), 1);
    }

    #[tokio::test]
    async fn test_get_load_balancer_new() {
        let (hcn, hns, endpoints) = fixture(Duration::ZERO).await;
        let cache = LoadBalancerCache::new();

        let lb = get(&hns, &endpoints, &cache).await.unwrap();
        let host = hcn.get_load_balancer_by_id(&lb.hns_id).await.unwrap();
        assert_eq!(host.id, lb.hns_id);
        assert_eq!(host.source_vip, SOURCE_VIP);
        assert_eq!(host.frontend_vips, vec![SERVICE_VIP.to_string()]);
        assert_eq!(
            host.host_compute_endpoints,
            vec![endpoints[0].hns_id.clone().unwrap()]
        );
        assert_eq!(host.port_mappings[0].protocol, 6);
        assert_eq!(host.port_mappings[0].internal_port, INTERNAL_PORT);
        assert_eq!(host.port_mappings[0].external_port, EXTERNAL_PORT);

        let id = LoadBalancerIdentifier::new(
            Protocol::Tcp,
            INTERNAL_PORT,
            EXTERNAL_PORT,
            SERVICE_VIP,
            1,
        );
        assert_eq!(cache.get(&id).await.unwrap().hns_id, lb.hns_id);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_get_load_balancer_existing() {
        let (hcn, hns, endpoints) = fixture(Duration::ZERO).await;

        // Rule created out-of-band and seeded into the cache.
        let existing = hcn
            .create_load_balancer(&HostLoadBalancer {
                host_compute_endpoints: vec![endpoints[0].hns_id.clone().unwrap()],
                source_vip: SOURCE_VIP.to_string(),
                frontend_vips: vec![SERVICE_VIP.to_string()],
                port_mappings: vec![PortMapping {
                    protocol: 6,
                    internal_port: INTERNAL_PORT,
                    external_port: EXTERNAL_PORT,
                    distribution_type: DistributionType::None,
                    flags: Default::default(),
                }],
                ..Default::default()
            })
            .await
            .unwrap();
        let cache = LoadBalancerCache::from_entries(hns.get_all_load_balancers().await.unwrap());
        assert_eq!(hcn.load_balancer_create_calls(), 1);

        let lb = get(&hns, &endpoints, &cache).await.unwrap();
        assert_eq!(lb.hns_id, existing.id);
        assert_eq!(lb.host, existing);
        assert_eq!(hcn.load_balancer_create_calls(), 1);
    }

    #[tokio::test]
    async fn test_cache_reuse() {
        let (hcn, hns, endpoints) = fixture(Duration::ZERO).await;
        let cache = LoadBalancerCache::new();

        let first = get(&hns, &endpoints, &cache).await.unwrap();
        let second = get(&hns, &endpoints, &cache).await.unwrap();
        assert_eq!(first.hns_id, second.hns_id);
        assert_eq!(hcn.load_balancer_create_calls(), 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_at_most_one_creation_under_concurrency() {
        let (hcn, hns, endpoints) = fixture(Duration::from_millis(20)).await;
        let cache = Arc::new(LoadBalancerCache::new());

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let hns = hns.clone();
            let endpoints = endpoints.clone();
            let cache = cache.clone();
            tasks.spawn(async move { get(&hns, &endpoints, &cache).await });
        }

        let mut ids = Vec::new();
        while let Some(result) = tasks.join_next().await {
            ids.push(result.unwrap().unwrap().hns_id);
        }
        assert_eq!(ids.len(), 8);
        assert!(ids.iter().all(|id| id == &ids[0]));
        assert_eq!(hcn.load_balancer_create_calls(), 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_stale_entry_is_recreated() {
        let (hcn, hns, endpoints) = fixture(Duration::ZERO).await;
        let cache = LoadBalancerCache::new();

        let first = get(&hns, &endpoints, &cache).await.unwrap();
        // Removed behind the proxy's back.
        hcn.delete_load_balancer(&first.hns_id).await.unwrap();

        let second = get(&hns, &endpoints, &cache).await.unwrap();
        assert_ne!(first.hns_id, second.hns_id);
        assert_eq!(hcn.load_balancer_create_calls(), 2);
        assert_eq!(cache.len().await, 1);
        assert!(hcn.get_load_balancer_by_id(&second.hns_id).await.is_ok());
    }

    #[tokio::test]
    async fn test_host_error_during_confirm_keeps_entry() {
        let (hcn, hns, endpoints) = fixture(Duration::ZERO).await;
        let cache = LoadBalancerCache::new();
        let first = get(&hns, &endpoints, &cache).await.unwrap();

        hcn.set_unavailable(true);
        let err = get(&hns, &endpoints, &cache).await.unwrap_err();
        assert!(matches!(err, Error::Api(_)));
        hcn.set_unavailable(false);

        assert_eq!(cache.len().await, 1);
        let again = get(&hns, &endpoints, &cache).await.unwrap();
        assert_eq!(again.hns_id, first.hns_id);
    }

    #[tokio::test]
    async fn test_flags_and_empty_vip() {
        let (hcn, hns, endpoints) = fixture(Duration::ZERO).await;
        let cache = LoadBalancerCache::new();
        let flags = LoadBalancerFlags {
            is_dsr: true,
            local_routed_vip: true,
            session_affinity: true,
            ..Default::default()
        };

        let lb = hns
            .get_load_balancer(&endpoints, flags, SOURCE_VIP, "", Protocol::Udp, 53, 30053, &cache)
            .await
            .unwrap();
        let host = hcn.get_load_balancer_by_id(&lb.hns_id).await.unwrap();
        assert!(host.frontend_vips.is_empty());
        assert_eq!(
            host.flags,
            HostLoadBalancerFlags {
                enable_direct_server_return: true,
                ipv6: false,
            }
        );
        assert!(host.port_mappings[0].flags.local_routed_vip);
        assert_eq!(host.port_mappings[0].distribution_type, DistributionType::SourceIp);
        assert_eq!(host.port_mappings[0].protocol, 17);
    }

    #[tokio::test]
    async fn test_same_count_different_backends_share_identifier() {
        let (_hcn, hns, endpoints) = fixture(Duration::ZERO).await;
        let cache = LoadBalancerCache::new();
        let other = hns
            .create_endpoint(&EndpointInfo::local("192.168.1.4", EP_MAC), NETWORK)
            .await
            .unwrap();

        let first = get(&hns, &endpoints, &cache).await.unwrap();
        let second = get(&hns, &[other], &cache).await.unwrap();
        assert_eq!(first.hns_id, second.hns_id);
    }

    #[tokio::test]
    async fn test_endpoint_without_host_id_is_rejected() {
        let (hcn, hns, _) = fixture(Duration::ZERO).await;
        let cache = LoadBalancerCache::new();
        let pending = vec![EndpointInfo::local("192.168.1.9", EP_MAC)];

        let err = get(&hns, &pending, &cache).await.unwrap_err();
        assert!(matches!(err, Error::Invalid(_)));
        assert_eq!(hcn.load_balancer_create_calls(), 0);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_delete_then_absent() {
        let (hcn, hns, endpoints) = fixture(Duration::ZERO).await;
        let cache = LoadBalancerCache::new();
        let lb = get(&hns, &endpoints, &cache).await.unwrap();

        hns.delete_load_balancer(&lb.hns_id).await.unwrap();
        let err = hcn.get_load_balancer_by_id(&lb.hns_id).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_get_all_load_balancers_reports_duplicates_once() {
        let (hcn, hns, endpoints) = fixture(Duration::ZERO).await;
        let ep_id = endpoints[0].hns_id.clone().unwrap();
        let rule = HostLoadBalancer {
            host_compute_endpoints: vec![ep_id],
            frontend_vips: vec![SERVICE_VIP.to_string()],
            port_mappings: vec![PortMapping {
                protocol: 6,
                internal_port: INTERNAL_PORT,
                external_port: EXTERNAL_PORT,
                distribution_type: DistributionType::None,
                flags: Default::default(),
            }],
            ..Default::default()
        };
        let first = hcn.create_load_balancer(&rule).await.unwrap();
        hcn.create_load_balancer(&rule).await.unwrap();
        // No port mapping: not something the proxy programs.
        hcn.create_load_balancer(&HostLoadBalancer::default()).await.unwrap();

        let all = hns.get_all_load_balancers().await.unwrap();
        assert_eq!(all.len(), 1);
        let id = LoadBalancerIdentifier::new(
            Protocol::Tcp,
            INTERNAL_PORT,
            EXTERNAL_PORT,
            SERVICE_VIP,
            1,
        );
        assert_eq!(all[&id].hns_id, first.id);
    }
}
