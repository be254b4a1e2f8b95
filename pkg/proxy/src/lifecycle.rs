use pkg_hcn::Result;
use pkg_types::endpoint::EndpointInfo;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::cache::LoadBalancerCache;
use crate::hns::Hns;
use crate::load_balancer::LoadBalancerIdentifier;

/// Outcome of [`Hns::teardown_service`], as host IDs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TeardownReport {
    pub deleted_load_balancers: Vec<String>,
    pub deleted_endpoints: Vec<String>,
    /// Endpoints kept because another rule still references them.
    pub retained_endpoints: Vec<String>,
    /// Rules with no host object, neither cached nor found on the host.
    pub missing_load_balancers: Vec<LoadBalancerIdentifier>,
}

impl Hns {
    /// Delete the host rule cached under `id` and drop the entry, under one
    /// cache lock. A rule already gone from the host counts as deleted.
    /// Returns the host ID that was removed, or `None` if nothing was cached.
    pub async fn delete_cached_load_balancer(
        &self,
        id: &LoadBalancerIdentifier,
        cache: &LoadBalancerCache,
    ) -> Result<Option<String>> {
        let mut entries = cache.lock().await;
        let Some(info) = entries.get(id).cloned() else {
            return Ok(None);
        };
        self.delete_host_rule(&info.hns_id, id).await?;
        entries.remove(id);
        Ok(Some(info.hns_id))
    }

    /// Delete every host rule for `id`: the cached one, or on a cache miss
    /// each host rule whose identifier matches. Runs under the cache lock.
    async fn delete_load_balancers_for(
        &self,
        id: &LoadBalancerIdentifier,
        cache: &LoadBalancerCache,
    ) -> Result<Vec<String>> {
        let mut entries = cache.lock().await;
        let host_ids = match entries.get(id) {
            Some(info) => vec![info.hns_id.clone()],
            None => {
                let found: Vec<String> = self
                    .api
                    .list_load_balancers()
                    .await?
                    .into_iter()
                    .filter(|lb| LoadBalancerIdentifier::from_host(lb).as_ref() == Some(id))
                    .map(|lb| lb.id)
                    .collect();
                if !found.is_empty() {
                    debug!("{} is not cached, found {} rules on the host", id, found.len());
                }
                found
            }
        };
        for hns_id in &host_ids {
            self.delete_host_rule(hns_id, id).await?;
        }
        entries.remove(id);
        Ok(host_ids)
    }

    async fn delete_host_rule(&self, hns_id: &str, id: &LoadBalancerIdentifier) -> Result<()> {
        match self.delete_load_balancer(hns_id).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => {
                debug!("Load balancer {} for {} was already gone", hns_id, id);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Remove every load balancer on the host and clear the cache.
    pub async fn delete_all_load_balancers(&self, cache: &LoadBalancerCache) -> Result<usize> {
        let mut entries = cache.lock().await;
        let mut deleted = 0;
        for lb in self.api.list_load_balancers().await? {
            match self.delete_load_balancer(&lb.id).await {
                Ok(()) => deleted += 1,
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        entries.clear();
        info!("Deleted {} load balancers", deleted);
        Ok(deleted)
    }

    /// Tear down a service: its rules first, then every backend endpoint no
    /// remaining rule references.
    ///
    /// Rules missing from the cache are looked up on the host. Rules found
    /// nowhere are listed in [`TeardownReport::missing_load_balancers`].
    /// A host refusal to delete an endpoint is returned, not ignored; the next
    /// pass retries it. Endpoints already gone are skipped.
    pub async fn teardown_service(
        &self,
        rules: &[LoadBalancerIdentifier],
        endpoints: &[EndpointInfo],
        cache: &LoadBalancerCache,
    ) -> Result<TeardownReport> {
        let mut report = TeardownReport::default();

        for id in rules {
            let deleted = self.delete_load_balancers_for(id, cache).await?;
            if deleted.is_empty() {
                warn!("No load balancer found for {}", id);
                report.missing_load_balancers.push(id.clone());
            }
            report.deleted_load_balancers.extend(deleted);
        }

        let referenced: HashSet<String> = self
            .api
            .list_load_balancers()
            .await?
            .into_iter()
            .flat_map(|lb| lb.host_compute_endpoints)
            .collect();

        for endpoint in endpoints {
            let Some(hns_id) = endpoint.hns_id.as_deref() else {
                continue;
            };
            if referenced.contains(hns_id) {
                debug!("Keeping endpoint {} ({}), still referenced", hns_id, endpoint.ip);
                report.retained_endpoints.push(hns_id.to_string());
                continue;
            }
            match self.delete_endpoint(hns_id).await {
                Ok(()) => report.deleted_endpoints.push(hns_id.to_string()),
                Err(e) if e.is_not_found() => {
                    debug!("Endpoint {} ({}) was already gone", hns_id, endpoint.ip);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(report)
    }
}
