use pkg_hcn::HostNetworkApi;
use std::sync::Arc;

/// Proxy-side client of the host network service.
///
/// Stateless apart from the API handle: load-balancer deduplication state
/// lives in a [`crate::LoadBalancerCache`] passed to each call.
#[derive(Clone)]
pub struct Hns {
    pub(crate) api: Arc<dyn HostNetworkApi>,
}

impl Hns {
    pub fn new(api: Arc<dyn HostNetworkApi>) -> Self {
        Self { api }
    }
}
