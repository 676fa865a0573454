//! Node registry — latest known identity, telemetry, and energy rating.
//!
//! Nodes are never removed. A node that stops reporting keeps its last
//! snapshot and is scored from it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use fitgrid_core::{DEFAULT_ENERGY_WATTS, NodeId, Telemetry, epoch_secs};

/// A worker node as seen by the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub node_id: NodeId,
    pub energy_watts: f64,
    /// Most recent telemetry push, if any.
    pub telemetry: Option<Telemetry>,
    pub registered_at: u64,
    /// Epoch seconds of the last telemetry push.
    pub last_seen: Option<u64>,
}

/// In-memory map of node id to [`Node`], iterated in id order.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: BTreeMap<NodeId, Node>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a node or update its energy rating. Returns true if the node is new.
    pub fn upsert(&mut self, node_id: &str, energy_watts: f64) -> bool {
        match self.nodes.get_mut(node_id) {
            Some(node) => {
                node.energy_watts = energy_watts;
                debug!(%node_id, energy_watts, "node energy rating updated");
                false
            }
            None => {
                self.nodes.insert(
                    node_id.to_string(),
                    Node {
                        node_id: node_id.to_string(),
                        energy_watts,
                        telemetry: None,
                        registered_at: epoch_secs(),
                        last_seen: None,
                    },
                );
                info!(%node_id, energy_watts, "node registered");
                true
            }
        }
    }

    /// Overwrite a node's latest telemetry, registering it at the default
    /// energy rating if unseen. Returns true if the node is new.
    pub fn record_telemetry(&mut self, node_id: &str, telemetry: Telemetry) -> bool {
        let created = if self.nodes.contains_key(node_id) {
            false
        } else {
            self.upsert(node_id, DEFAULT_ENERGY_WATTS)
        };

        if let Some(node) = self.nodes.get_mut(node_id) {
            node.telemetry = Some(telemetry);
            node.last_seen = Some(epoch_secs());
        }
        created
    }

    pub fn get(&self, node_id: &str) -> Option<&Node> {
        self.nodes.get(node_id)
    }

    /// Latest telemetry for a node, if it has reported any.
    pub fn snapshot(&self, node_id: &str) -> Option<&Telemetry> {
        self.nodes.get(node_id)?.telemetry.as_ref()
    }

    /// All nodes that have reported telemetry, in id order.
    pub fn all_snapshots(&self) -> impl Iterator<Item = (&NodeId, &Telemetry)> {
        self.nodes
            .iter()
            .filter_map(|(id, node)| node.telemetry.as_ref().map(|t| (id, t)))
    }

    /// All registered nodes, in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Energy rating of a node, or the default rating if unknown.
    pub fn energy_watts(&self, node_id: &str) -> f64 {
        self.nodes
            .get(node_id)
            .map(|n| n.energy_watts)
            .unwrap_or(DEFAULT_ENERGY_WATTS)
    }

    /// Highest energy rating across registered nodes (default rating when empty).
    pub fn max_energy_watts(&self) -> f64 {
        self.nodes
            .values()
            .map(|n| n.energy_watts)
            .fold(None, |max: Option<f64>, w| Some(max.map_or(w, |m| m.max(w))))
            .unwrap_or(DEFAULT_ENERGY_WATTS)
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.nodes.contains_key(node_id)
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

    #[test]
    fn upsert_is_idempotent() {
        let mut registry = NodeRegistry::new();
        assert!(registry.upsert("n1", 120.0));
        assert!(!registry.upsert("n1", 120.0));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.energy_watts("n1"), 120.0);
    }

    #[test]
    fn upsert_updates_energy_but_keeps_telemetry() {
        let mut registry = NodeRegistry::new();
        registry.record_telemetry("n1", Telemetry::new(10.0, 20.0, None));
        registry.upsert("n1", 80.0);

        assert_eq!(registry.energy_watts("n1"), 80.0);
        assert_eq!(registry.snapshot("n1").unwrap().cpu_percent, 10.0);
    }

    #[test]
    fn telemetry_auto_registers_with_default_rating() {
        let mut registry = NodeRegistry::new();
        assert!(registry.record_telemetry("ghost", Telemetry::new(50.0, 50.0, Some(60.0))));
        assert!(!registry.record_telemetry("ghost", Telemetry::new(55.0, 50.0, Some(61.0))));

        let node = registry.get("ghost").unwrap();
        assert_eq!(node.energy_watts, DEFAULT_ENERGY_WATTS);
        assert_eq!(node.telemetry.as_ref().unwrap().cpu_percent, 55.0);
        assert!(node.last_seen.is_some());
    }

    #[test]
    fn snapshots_skip_silent_nodes_and_are_ordered() {
        let mut registry = NodeRegistry::new();
        registry.upsert("silent", 100.0);
        registry.record_telemetry("b", Telemetry::new(1.0, 1.0, None));
        registry.record_telemetry("a", Telemetry::new(2.0, 2.0, None));

        let ids: Vec<&str> = registry.all_snapshots().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(registry.snapshot("silent").is_none());
        assert!(registry.snapshot("missing").is_none());
    }

    #[test]
    fn max_energy_defaults_when_empty() {
        let mut registry = NodeRegistry::new();
        assert_eq!(registry.max_energy_watts(), DEFAULT_ENERGY_WATTS);

        registry.upsert("a", 80.0);
        registry.upsert("b", 150.0);
        registry.upsert("c", 120.0);
        assert_eq!(registry.max_energy_watts(), 150.0);
        assert_eq!(registry.energy_watts("unknown"), DEFAULT_ENERGY_WATTS);
    }
}
