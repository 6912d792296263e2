use super::node::{NodeId, TrackedNode};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Owns every tracked node. Nodes are only ever appended; they live as long as
/// the graph does.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: Vec<TrackedNode>,
    index: HashMap<String, NodeId>,
    /// Discovery holds this shared; the hash pass holds it exclusively,
    /// since its cycle guard cannot be shared.
    pub(crate) phase: RwLock<()>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. A name that is already registered keeps its existing node.
    pub fn add(&mut self, node: TrackedNode) -> NodeId {
        if let Some(&id) = self.index.get(node.name()) {
            return id;
        }
        let id = NodeId(self.nodes.len());
        self.index.insert(node.name().to_string(), id);
        self.nodes.push(node);
        id
    }

    pub fn lookup(&self, name: &str) -> Option<NodeId> {
        self.index.get(name).copied()
    }

    pub fn node(&self, id: NodeId) -> &TrackedNode {
        &self.nodes[id.0]
    }

    pub fn get(&self, name: &str) -> Option<&TrackedNode> {
        self.lookup(name).map(|id| self.node(id))
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
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
    use chrono::Utc;

    #[test]
    fn test_reregistering_keeps_first_node() {
        let mut graph = DependencyGraph::new();
        let first = Utc::now();
        let a = graph.add(TrackedNode::package("/Game/A", first));
        let again = graph.add(TrackedNode::package("/Game/A", first + chrono::Duration::days(1)));
        assert_eq!(a, again);
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.node(a).snapshot().timestamp, first);
    }

    #[test]
    fn test_lookup() {
        let mut graph = DependencyGraph::new();
        let b = graph.add(TrackedNode::package("/Game/B", Utc::now()));
        assert_eq!(graph.lookup("/Game/B"), Some(b));
        assert!(graph.lookup("/Game/C").is_none());
        assert_eq!(graph.get("/Game/B").map(|n| n.name()), Some("/Game/B"));
        assert_eq!(graph.ids().collect::<Vec<_>>(), vec![b]);
    }
}
