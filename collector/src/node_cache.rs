//! In-memory view of validator nodes, loaded from storage.
//!
//! Derived state: rebuilt from [`NodeStore::node_reputation_snapshot`] at
//! start-up and again before every retry of a failed block.

use scan_store::{NodeReputation, NodeStore, StoreError};
use std::collections::HashMap;
use tracing::info;

#[derive(Debug, Default)]
pub struct NodeCache {
    nodes: HashMap<String, NodeReputation>,
    loaded: bool,
}

impl NodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cache contents with the persisted snapshot.
    pub fn reload(&mut self, store: &dyn NodeStore) -> Result<usize, StoreError> {
        let snapshot = store.node_reputation_snapshot()?;
        self.nodes = snapshot
            .into_iter()
            .map(|node| (node.node_id.clone(), node))
            .collect();
        self.loaded = true;
        info!(nodes = self.nodes.len(), "node cache reloaded");
        Ok(self.nodes.len())
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn get(&self, node_id: &str) -> Option<&NodeReputation> {
        self.nodes.get(node_id)
    }

    pub fn name_of(&self, node_id: &str) -> Option<String> {
        self.get(node_id).map(|n| n.node_name.clone())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scan_nullables::NullStore;

    fn node(id: &str, name: &str) -> NodeReputation {
        NodeReputation {
            node_id: id.into(),
            node_name: name.into(),
            staking_block: 1,
            total_stake: 10,
            slashed: false,
        }
    }

    #[test]
    fn reload_replaces_contents() {
        let store = NullStore::new();
        store.set_nodes(vec![node("0x01", "alpha")]);
        let mut cache = NodeCache::new();
        assert!(!cache.is_loaded());
        cache.reload(&store).unwrap();
        assert_eq!(cache.name_of("0x01").as_deref(), Some("alpha"));

        store.set_nodes(vec![node("0x02", "beta")]);
        cache.reload(&store).unwrap();
        assert_eq!(cache.name_of("0x01"), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failed_reload_keeps_previous_view() {
        let store = NullStore::new();
        store.set_nodes(vec![node("0x01", "alpha")]);
        let mut cache = NodeCache::new();
        cache.reload(&store).unwrap();
        store.fail_next_snapshots(1);
        assert!(cache.reload(&store).is_err());
        assert_eq!(cache.len(), 1);
    }
}
