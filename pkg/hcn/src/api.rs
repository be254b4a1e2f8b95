use async_trait::async_trait;
use pkg_types::endpoint::HostEndpoint;
use pkg_types::load_balancer::HostLoadBalancer;
use pkg_types::network::HostNetwork;

use crate::error::Result;

/// Host network control-plane client.
///
/// Every call may block on a control-plane round trip. Implementations report
/// absence as [`crate::Error::NotFound`] and every other failure as
/// [`crate::Error::Api`]; they never retry.
#[async_trait]
pub trait HostNetworkApi: Send + Sync {
    /// Human-readable name of this implementation.
    fn name(&self) -> &str;

    async fn get_network_by_name(&self, name: &str) -> Result<HostNetwork>;

    async fn list_endpoints_of_network(&self, network_id: &str) -> Result<Vec<HostEndpoint>>;

    async fn get_endpoint_by_id(&self, id: &str) -> Result<HostEndpoint>;

    async fn get_endpoint_by_name(&self, name: &str) -> Result<HostEndpoint>;

    async fn list_endpoints(&self) -> Result<Vec<HostEndpoint>>;

    async fn get_load_balancer_by_id(&self, id: &str) -> Result<HostLoadBalancer>;

    async fn list_load_balancers(&self) -> Result<Vec<HostLoadBalancer>>;

    /// Create `endpoint` inside the network `network_id`. The returned object
    /// carries the host-assigned ID.
    async fn create_endpoint(&self, network_id: &str, endpoint: &HostEndpoint)
    -> Result<HostEndpoint>;

    /// Create a load-balancing rule. The returned object carries the host-assigned ID.
    async fn create_load_balancer(&self, load_balancer: &HostLoadBalancer)
    -> Result<HostLoadBalancer>;

    async fn delete_endpoint(&self, id: &str) -> Result<()>;

    async fn delete_load_balancer(&self, id: &str) -> Result<()>;
}
