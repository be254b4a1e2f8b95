use std::collections::HashMap;
use tokio::sync::{Mutex, MutexGuard};

use crate::load_balancer::{LoadBalancerIdentifier, LoadBalancerInfo};

/// Process-wide map from rule identity to the host rule that implements it.
///
/// A single async mutex guards the whole map. [`crate::Hns::get_load_balancer`]
/// holds it across the lookup, the host-side create and the insert, so two
/// concurrent passes for the same identifier can never both create a rule.
/// Entries must only be removed together with the host rule they point at.
#[derive(Debug, Default)]
pub struct LoadBalancerCache {
    entries: Mutex<HashMap<LoadBalancerIdentifier, LoadBalancerInfo>>,
}

impl LoadBalancerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the cache, e.g. from [`crate::Hns::get_all_load_balancers`] after a restart.
    pub fn from_entries(entries: HashMap<LoadBalancerIdentifier, LoadBalancerInfo>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }

    pub(crate) async fn lock(
        &self,
    ) -> MutexGuard<'_, HashMap<LoadBalancerIdentifier, LoadBalancerInfo>> {
        self.entries.lock().await
    }

    pub async fn get(&self, id: &LoadBalancerIdentifier) -> Option<LoadBalancerInfo> {
        self.entries.lock().await.get(id).cloned()
    }

    pub async fn contains(&self, id: &LoadBalancerIdentifier) -> bool {
        self.entries.lock().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
