//! Two-phase resolution of the dependency graph.
//!
//! Discovery walks the graph breadth first and fills in each node's direct
//! edges by asking the [`PackageSource`]. Only once a whole closure has its
//! edges does the hash pass run: a depth-first walk that folds every reachable
//! node's own digest into one running hash, in edge-name order, and keeps the
//! earliest timestamp it sees. Each node is folded in at most once per root;
//! the per-node `being_processed` flag marks the frames currently on the stack.

use super::node::NodeId;
use super::registry::DependencyGraph;
use crate::error::{DepInfoError, Result};
use crate::hasher::DigestBuilder;
use crate::source::{NameResolver, PackageSource};
use crate::tracker::{SCRIPT_SOURCE_NAME, SHADER_SOURCE_NAME};
use crate::Timestamp;
use chrono::{DateTime, Utc};
use parking_lot::RwLockReadGuard;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, warn};

/// Borrowed view of a graph plus the collaborators needed to expand it.
#[derive(Clone, Copy)]
pub struct Resolver<'a> {
    graph: &'a DependencyGraph,
    source: &'a dyn PackageSource,
    names: &'a dyn NameResolver,
}

impl<'a> Resolver<'a> {
    pub fn new(
        graph: &'a DependencyGraph,
        source: &'a dyn PackageSource,
        names: &'a dyn NameResolver,
    ) -> Self {
        Self {
            graph,
            source,
            names,
        }
    }

    pub fn graph(&self) -> &'a DependencyGraph {
        self.graph
    }

    /// Shared guard for a discovery phase driven from outside the resolver.
    pub fn discovery(&self) -> RwLockReadGuard<'a, ()> {
        self.graph.phase.read()
    }

    /// Fill in the direct edges of `id` and return the nodes they point at.
    ///
    /// Callers outside this module must hold [`Resolver::discovery`] while
    /// calling it, so no hash pass runs at the same time.
    ///
    /// The package source is consulted at most once per node. A node that was
    /// already resolved just reports its existing edges; one that failed
    /// before fails again without a second attempt.
    pub fn resolve_direct_dependencies(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let node = self.graph.node(id);
        let mut state = node.state();
        assert!(
            !state.being_processed,
            "{} is being hashed while its dependencies are resolved",
            node.name()
        );

        if state.dependencies_resolved {
            return Ok(state.dependencies.values().copied().collect());
        }
        if !state.valid {
            return Err(DepInfoError::Unresolvable {
                name: node.name().to_string(),
                reason: state.failure.clone().unwrap_or_default(),
            });
        }

        let info = match self.source.open_and_classify(node.name()) {
            Ok(info) => info,
            Err(e) => {
                warn!("Failed to open package {}: {e}", node.name());
                state.valid = false;
                state.failure = Some(e.to_string());
                return Err(DepInfoError::Unresolvable {
                    name: node.name().to_string(),
                    reason: e.to_string(),
                });
            }
        };

        state.full_hash = info.full_hash;
        state.classification = info.classification;

        let mut touched = Vec::new();
        let synthetic = [
            (info.classification.contains_shaders, SHADER_SOURCE_NAME),
            (info.classification.contains_script, SCRIPT_SOURCE_NAME),
        ];
        for (_, name) in synthetic.iter().filter(|(flag, _)| *flag) {
            if let Some(target) = self.graph.lookup(name) {
                state.dependencies.insert(name.to_string(), target);
                touched.push(target);
            }
        }

        for dependency in &info.dependencies {
            if !self.names.is_valid_dependency_name(dependency) {
                debug!("{} --> {dependency}: not a valid package name", node.name());
                continue;
            }
            let key = self.names.canonical_key(dependency);
            let Some(target) = self.graph.lookup(&key) else {
                debug!("{} --> {key}: not tracked", node.name());
                continue;
            };
            state.dependencies.insert(key, target);
            touched.push(target);
        }

        state.dependencies_resolved = true;
        Ok(touched)
    }

    /// Breadth-first expansion from `root` until a pass finds nothing new.
    ///
    /// Nodes that cannot be opened stay in the returned set; they are simply
    /// not expanded.
    pub fn resolve_transitive_closure(&self, root: NodeId) -> BTreeSet<NodeId> {
        let _discovery = self.graph.phase.read();
        let mut all = BTreeSet::from([root]);
        let mut frontier = vec![root];

        while !frontier.is_empty() {
            let mut next = Vec::new();
            for id in frontier {
                match self.resolve_direct_dependencies(id) {
                    Ok(touched) => next.extend(touched.into_iter().filter(|t| all.insert(*t))),
                    Err(e) => debug!("Not expanding {}: {e}", self.graph.node(id).name()),
                }
            }
            frontier = next;
        }

        all
    }

    /// Compute dependent hashes and timestamps for every node in `nodes`
    /// that does not have them yet. Must follow discovery of the same set.
    pub fn resolve_hashes_and_timestamps<I>(&self, nodes: I)
    where
        I: IntoIterator<Item = NodeId>,
    {
        let _pass = self.graph.phase.write();
        let nodes: Vec<NodeId> = nodes.into_iter().collect();

        for &id in &nodes {
            let node = self.graph.node(id);
            let state = node.state();
            assert!(!state.being_processed, "{} left marked in-progress", node.name());
            assert!(
                state.dependencies_resolved || !state.valid,
                "{} reached the hash pass before discovery",
                node.name()
            );
        }

        for &id in &nodes {
            let node = self.graph.node(id);
            {
                let state = node.state();
                if state.hashes_resolved || !state.valid || state.unresolved_dependency.is_some() {
                    continue;
                }
            }

            let mut walk = HashWalk::default();
            let outcome = self.compute_transitive_hash(id, &mut walk);

            let mut state = node.state();
            match outcome {
                Ok(()) => {
                    state.dependent_hash = walk.hasher.finalize();
                    state.dependent_timestamp = walk.earliest.unwrap_or(DateTime::<Utc>::MIN_UTC);
                    state.hashes_resolved = true;
                }
                Err(dependency) => {
                    debug!("{} depends on unresolvable {dependency}", node.name());
                    state.unresolved_dependency = Some(dependency);
                }
            }
        }

        for &id in &nodes {
            let node = self.graph.node(id);
            let state = node.state();
            assert!(!state.being_processed, "{} left marked in-progress", node.name());
            assert!(
                state.hashes_resolved || !state.valid || state.unresolved_dependency.is_some(),
                "{} was not hashed",
                node.name()
            );
        }
    }

    /// Fold `root` and everything below it into the walk, depth first with
    /// edges in name order. Returns the name of the first invalid node
    /// reached, if any.
    ///
    /// Frames live on an explicit stack, so path length is bounded by memory
    /// rather than by the thread's stack.
    fn compute_transitive_hash(
        &self,
        root: NodeId,
        walk: &mut HashWalk,
    ) -> std::result::Result<(), String> {
        let mut stack: Vec<Frame> = Vec::new();
        let mut outcome = self.enter(root, walk).map(|frame| stack.extend(frame));

        while outcome.is_ok() {
            let next = match stack.last_mut() {
                Some(frame) => {
                    let next = frame.dependencies.get(frame.next).copied();
                    frame.next += 1;
                    next
                }
                None => break,
            };
            match next {
                Some(dependency) => {
                    outcome = self.enter(dependency, walk).map(|frame| stack.extend(frame));
                }
                None => {
                    if let Some(frame) = stack.pop() {
                        self.graph.node(frame.id).state().being_processed = false;
                    }
                }
            }
        }

        // an invalid node stops the walk; unmark whatever is still open
        for frame in stack.drain(..) {
            self.graph.node(frame.id).state().being_processed = false;
        }
        outcome
    }

    /// Fold one node into the walk and open a frame for its edges. Nodes
    /// already on the stack or already folded yield no frame.
    fn enter(&self, id: NodeId, walk: &mut HashWalk) -> std::result::Result<Option<Frame>, String> {
        let node = self.graph.node(id);
        let mut state = node.state();
        if state.being_processed {
            // cycle; an open frame is already folding this node in
            return Ok(None);
        }
        if walk.visited.contains(&id) {
            return Ok(None);
        }
        if !state.valid {
            return Err(node.name().to_string());
        }
        assert!(
            state.dependencies_resolved,
            "{} is being hashed before its dependencies were resolved",
            node.name()
        );
        debug_assert!(state.full_hash.is_valid(), "{} has no content hash", node.name());
        state.being_processed = true;
        walk.visited.insert(id);

        if state.timestamp != DateTime::<Utc>::MIN_UTC {
            let timestamp = state.timestamp;
            walk.earliest = Some(walk.earliest.map_or(timestamp, |e| e.min(timestamp)));
        }
        walk.hasher.update_digest(&state.full_hash);

        Ok(Some(Frame {
            id,
            dependencies: state.dependencies.values().copied().collect(),
            next: 0,
        }))
    }
}

/// One node whose edges are still being walked.
struct Frame {
    id: NodeId,
    dependencies: Vec<NodeId>,
    next: usize,
}

/// Accumulators for one root's hash pass.
#[derive(Default)]
struct HashWalk {
    hasher: DigestBuilder,
    earliest: Option<Timestamp>,
    visited: HashSet<NodeId>,
}
