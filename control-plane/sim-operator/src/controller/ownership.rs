use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::resources::ObjectKey;

/// Parent → children table. Records every child the engine applied for a
/// root and whether the platform garbage collects it (owned) or it is only
/// linked by labels.
#[derive(Clone, Default)]
pub struct OwnershipTable(Arc<RwLock<HashMap<ObjectKey, BTreeMap<ObjectKey, bool>>>>);

impl OwnershipTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, root: &ObjectKey, child: ObjectKey, owned: bool) {
        let mut w = self.0.write().await;
        w.entry(root.clone()).or_default().insert(child, owned);
    }

    pub async fn children(&self, root: &ObjectKey) -> BTreeMap<ObjectKey, bool> {
        let r = self.0.read().await;
        r.get(root).cloned().unwrap_or_default()
    }

    /// Children that outlive the root unless deleted explicitly.
    pub async fn cross_namespace(&self, root: &ObjectKey) -> Vec<ObjectKey> {
        let r = self.0.read().await;
        r.get(root)
            .map(|c| {
                c.iter()
                    .filter(|(_, owned)| !**owned)
                    .map(|(k, _)| k.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub async fn forget(&self, root: &ObjectKey) {
        let mut w = self.0.write().await;
        w.remove(root);
    }
}
