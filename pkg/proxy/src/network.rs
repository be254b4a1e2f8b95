use pkg_hcn::Result;
use pkg_types::network::NetworkInfo;
use tracing::debug;

use crate::hns::Hns;

impl Hns {
    /// Look up a host network by name. Not cached.
    pub async fn get_network_by_name(&self, name: &str) -> Result<NetworkInfo> {
        let network = self.api.get_network_by_name(name).await?;
        debug!(
            "Resolved network {} -> {} ({})",
            name, network.id, network.network_type
        );
        Ok(network.into())
    }
}
