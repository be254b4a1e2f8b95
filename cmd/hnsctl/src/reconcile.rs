use pkg_hcn::Result;
use pkg_proxy::{Hns, LoadBalancerCache, LoadBalancerIdentifier};
use pkg_types::config::{BackendConfig, ServiceConfig};
use pkg_types::endpoint::EndpointInfo;
use pkg_types::load_balancer::LoadBalancerFlags;
use serde::Serialize;
use tracing::info;

/// Host objects backing one configured service.
#[derive(Debug, Clone, Serialize)]
pub struct ProgrammedService {
    pub name: String,
    pub identifier: LoadBalancerIdentifier,
    pub load_balancer: String,
    pub endpoints: Vec<EndpointInfo>,
}

fn endpoint_for(backend: &BackendConfig) -> EndpointInfo {
    match backend.provider_address.as_deref() {
        Some(pa) => EndpointInfo::remote(&backend.ip, &backend.mac, pa),
        None => EndpointInfo::local(&backend.ip, &backend.mac),
    }
}

/// Make sure every backend endpoint and the service's rule exist on the host.
/// Safe to repeat: existing objects are reused.
pub async fn sync_service(
    hns: &Hns,
    svc: &ServiceConfig,
    network_name: &str,
    source_vip: &str,
    flags: LoadBalancerFlags,
    cache: &LoadBalancerCache,
) -> Result<ProgrammedService> {
    let mut endpoints = Vec::with_capacity(svc.backends.len());
    for backend in &svc.backends {
        endpoints.push(hns.ensure_endpoint(&endpoint_for(backend), network_name).await?);
    }

    let rule = hns
        .get_load_balancer(
            &endpoints,
            flags,
            source_vip,
            &svc.vip,
            svc.protocol,
            svc.target_port,
            svc.port,
            cache,
        )
        .await?;
    info!(
        "Service {} -> load balancer {} ({} backends)",
        svc.name,
        rule.hns_id,
        endpoints.len()
    );

    Ok(ProgrammedService {
        name: svc.name.clone(),
        identifier: LoadBalancerIdentifier::new(
            svc.protocol,
            svc.target_port,
            svc.port,
            &svc.vip,
            endpoints.len(),
        ),
        load_balancer: rule.hns_id,
        endpoints,
    })
}
