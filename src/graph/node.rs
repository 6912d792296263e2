use crate::hasher::Digest;
use crate::source::Classification;
use crate::Timestamp;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use std::collections::BTreeMap;

/// Index of a node inside its [`DependencyGraph`](super::DependencyGraph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum NodeKind {
    /// A package file found under a content root.
    Package,
    /// All shader source files rolled into one node.
    ShaderSource,
    /// All script module headers rolled into one node.
    ScriptSource,
    /// Headers of a single script module, named `/Script/<Module>`.
    ScriptModule,
}

impl NodeKind {
    pub fn is_synthetic(self) -> bool {
        !matches!(self, NodeKind::Package)
    }
}

/// Mutable part of a node.
///
/// `dependencies` is written once, together with `dependencies_resolved`, and
/// never touched again. `being_processed` is only set while the hash pass is
/// inside this node's frame.
#[derive(Debug, Clone)]
pub struct NodeState {
    pub timestamp: Timestamp,
    pub full_hash: Digest,
    pub dependent_hash: Digest,
    pub dependent_timestamp: Timestamp,
    /// Ordered by name, which is the order the hash pass folds them in.
    pub dependencies: BTreeMap<String, NodeId>,
    pub classification: Classification,
    pub valid: bool,
    /// Why the package source could not open this node.
    pub failure: Option<String>,
    /// First invalid node found in this node's closure.
    pub unresolved_dependency: Option<String>,
    pub dependencies_resolved: bool,
    pub hashes_resolved: bool,
    pub being_processed: bool,
}

impl NodeState {
    fn new(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            full_hash: Digest::default(),
            dependent_hash: Digest::default(),
            dependent_timestamp: DateTime::<Utc>::MIN_UTC,
            dependencies: BTreeMap::new(),
            classification: Classification::default(),
            valid: true,
            failure: None,
            unresolved_dependency: None,
            dependencies_resolved: false,
            hashes_resolved: false,
            being_processed: false,
        }
    }
}

/// One tracked artifact. Owned by the graph; edges refer to it by [`NodeId`].
#[derive(Debug)]
pub struct TrackedNode {
    name: String,
    kind: NodeKind,
    state: Mutex<NodeState>,
}

impl TrackedNode {
    /// A package whose dependencies are not known yet.
    pub fn package(name: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Package,
            state: Mutex::new(NodeState::new(timestamp)),
        }
    }

    /// A node with no dependencies whose hashes are final from the start.
    pub fn leaf(
        name: impl Into<String>,
        kind: NodeKind,
        timestamp: Timestamp,
        full_hash: Digest,
    ) -> Self {
        let mut state = NodeState::new(timestamp);
        state.full_hash = full_hash;
        state.dependent_hash = full_hash;
        state.dependent_timestamp = timestamp;
        state.dependencies_resolved = true;
        state.hashes_resolved = true;
        Self {
            name: name.into(),
            kind,
            state: Mutex::new(state),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn state(&self) -> MutexGuard<'_, NodeState> {
        self.state.lock()
    }

    pub fn snapshot(&self) -> NodeState {
        self.state.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_starts_unresolved() {
        let node = TrackedNode::package("/Game/A", Utc::now());
        let state = node.snapshot();
        assert!(state.valid);
        assert!(!state.dependencies_resolved);
        assert!(!state.hashes_resolved);
        assert!(!state.full_hash.is_valid());
        assert_eq!(node.kind(), NodeKind::Package);
    }

    #[test]
    fn test_leaf_is_final() {
        let now = Utc::now();
        let digest = Digest::of(b"shaders");
        let node = TrackedNode::leaf("*** SHADERSOURCE ***", NodeKind::ShaderSource, now, digest);
        let state = node.snapshot();
        assert!(state.dependencies_resolved && state.hashes_resolved);
        assert_eq!(state.dependent_hash, digest);
        assert_eq!(state.dependent_timestamp, now);
        assert!(node.kind().is_synthetic());
    }
}
