//! Public query surface over one dependency graph.
//!
//! A tracker is built from a [`TrackerConfig`] and a [`PackageSource`],
//! populated by [`DependencyTracker::initialize`], and then answers queries.
//! The first query for a package resolves its whole closure; later queries
//! for anything in that closure are served from the nodes directly.

use crate::config::TrackerConfig;
use crate::coordinator::{self, CancellationToken, ConcurrencyOptions, ResolutionReport};
use crate::error::{DepInfoError, Result};
use crate::graph::{DependencyGraph, NodeId, NodeKind, NodeState, Resolver, TrackedNode};
use crate::hasher::file_hasher::combine;
use crate::hasher::walker::find_module_source_paths;
use crate::hasher::{scan, Digest, ScanFilters, SourceSummary};
use crate::source::names::script_package_name;
use crate::source::{
    Classification, ContentRoot, JsonPackageSource, LongPackageNames, NameResolver, PackageSource,
};
use crate::Timestamp;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub const SHADER_SOURCE_NAME: &str = "*** SHADERSOURCE ***";
pub const SCRIPT_SOURCE_NAME: &str = "*** SCRIPTSOURCE ***";

pub struct DependencyTracker {
    config: TrackerConfig,
    graph: DependencyGraph,
    source: Arc<dyn PackageSource>,
    names: Arc<dyn NameResolver>,
    newest_shader_source: Option<String>,
}

impl DependencyTracker {
    pub fn new(config: TrackerConfig, source: Arc<dyn PackageSource>) -> Self {
        Self {
            config,
            graph: DependencyGraph::new(),
            source,
            names: Arc::new(LongPackageNames),
            newest_shader_source: None,
        }
    }

    /// Tracker reading JSON package descriptors from the configured content roots.
    pub fn from_config(config: TrackerConfig) -> Self {
        let source = JsonPackageSource::new(
            normalized_roots(&config.content_roots),
            config.package_extensions.clone(),
        );
        Self::new(config, Arc::new(source))
    }

    pub fn with_name_resolver(mut self, names: Arc<dyn NameResolver>) -> Self {
        self.names = names;
        self
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Build the shader and script source nodes and register every content
    /// package. With `pre_resolve_all`, resolve every package right away.
    pub fn initialize(&mut self, pre_resolve_all: bool) -> Result<()> {
        let started = Instant::now();
        self.determine_shader_source();
        self.determine_script_source();
        self.prep_content_packages()?;

        info!(
            "Registered {} dependency nodes in {:?}",
            self.graph.len(),
            started.elapsed()
        );

        if pre_resolve_all {
            self.resolve_all();
        }
        Ok(())
    }

    /// Register a package with its own timestamp. Names already known keep their node.
    pub fn register_package(&mut self, name: impl Into<String>, timestamp: Timestamp) -> NodeId {
        self.graph.add(TrackedNode::package(name, timestamp))
    }

    /// Register a node whose hashes are final on creation.
    pub fn register_source_node(
        &mut self,
        name: impl Into<String>,
        kind: NodeKind,
        timestamp: Timestamp,
        hash: Digest,
    ) -> NodeId {
        self.graph.add(TrackedNode::leaf(name, kind, timestamp, hash))
    }

    fn determine_shader_source(&mut self) {
        let summary = match &self.config.shader_dir {
            Some(dir) => {
                let filters = ScanFilters::new()
                    .file_includes(self.config.shader_extensions.iter().cloned())
                    .ignore(self.config.ignore_rules())
                    .compute_hashes(true);
                match scan(dir, &filters) {
                    Ok(records) => SourceSummary::from_records(&records),
                    Err(e) => {
                        warn!("No shader source scanned: {e:#}");
                        SourceSummary::from_records(&BTreeMap::new())
                    }
                }
            }
            None => SourceSummary::from_records(&BTreeMap::new()),
        };

        debug!(
            "Shader source: {} files, newest {:?}",
            summary.file_count, summary.newest_file
        );
        self.newest_shader_source = summary.newest_file.clone();
        self.register_source_node(
            SHADER_SOURCE_NAME,
            NodeKind::ShaderSource,
            summary.newest,
            summary.digest,
        );
    }

    fn determine_script_source(&mut self) {
        let filters = ScanFilters::new()
            .directory_includes(self.config.script_directory_filters.iter().cloned())
            .file_includes(self.config.script_file_filters.iter().cloned())
            .ignore(self.config.ignore_rules())
            .compute_hashes(true);

        let mut modules: BTreeMap<String, SourceSummary> = BTreeMap::new();
        for dir in &self.config.script_source_dirs {
            for (module, path) in find_module_source_paths(dir, &self.config.script_module_marker) {
                if modules.contains_key(&module) {
                    debug!("Module {module} already found, ignoring {}", path.display());
                    continue;
                }
                match scan(&path, &filters) {
                    Ok(records) if !records.is_empty() => {
                        modules.insert(module, SourceSummary::from_records(&records));
                    }
                    Ok(_) => debug!("Module {module} has no script headers"),
                    Err(e) => warn!("Unable to scan script module {module}: {e:#}"),
                }
            }
        }

        let mut newest = DateTime::<Utc>::MIN_UTC;
        for (module, summary) in &modules {
            newest = newest.max(summary.newest);
            self.register_source_node(
                script_package_name(module),
                NodeKind::ScriptModule,
                summary.newest,
                summary.digest,
            );
        }

        let umbrella = combine(modules.values().map(|summary| &summary.digest));
        self.register_source_node(SCRIPT_SOURCE_NAME, NodeKind::ScriptSource, newest, umbrella);
        debug!("Script source: {} modules", modules.len());
    }

    fn prep_content_packages(&mut self) -> Result<()> {
        let filters = ScanFilters::new().ignore(self.config.ignore_rules());
        for root in normalized_roots(&self.config.content_roots) {
            let records = scan(&root.path, &filters)?;
            for (relative, record) in records {
                if !self.config.is_package_file(&relative) {
                    continue;
                }
                let name = root.long_package_name(&relative);
                if !self.names.is_valid_dependency_name(&name) {
                    debug!("Skipping {relative}: {name} is not a valid package name");
                    continue;
                }
                self.register_package(name, record.timestamp);
            }
        }
        Ok(())
    }

    fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.graph, self.source.as_ref(), self.names.as_ref())
    }

    fn lookup(&self, name: &str) -> Result<NodeId> {
        self.graph.lookup(name).ok_or_else(|| DepInfoError::NotFound {
            name: name.to_string(),
        })
    }

    /// Make sure `name` and its closure went through both phases.
    fn ensure_resolved(&self, name: &str) -> Result<NodeId> {
        let id = self.lookup(name)?;
        {
            let state = self.graph.node(id).state();
            if state.hashes_resolved || state.unresolved_dependency.is_some() {
                return Ok(id);
            }
        }
        let resolver = self.resolver();
        let closure = resolver.resolve_transitive_closure(id);
        resolver.resolve_hashes_and_timestamps(closure);
        Ok(id)
    }

    /// State of a resolved node that itself opened fine.
    fn opened_state(&self, name: &str) -> Result<NodeState> {
        let id = self.ensure_resolved(name)?;
        let state = self.graph.node(id).snapshot();
        if !state.valid {
            return Err(DepInfoError::Unresolvable {
                name: name.to_string(),
                reason: state.failure.unwrap_or_default(),
            });
        }
        Ok(state)
    }

    /// State of a node whose entire closure resolved.
    fn resolved_state(&self, name: &str) -> Result<NodeState> {
        let state = self.opened_state(name)?;
        if let Some(dependency) = state.unresolved_dependency {
            return Err(DepInfoError::DependencyUnresolvable {
                name: name.to_string(),
                dependency,
            });
        }
        Ok(state)
    }

    /// Earliest timestamp in the package's closure, itself included.
    pub fn dependent_timestamp(&self, name: &str) -> Result<Timestamp> {
        Ok(self.resolved_state(name)?.dependent_timestamp)
    }

    /// Digest over the package and its whole closure, in name order.
    pub fn dependent_hash(&self, name: &str) -> Result<Digest> {
        Ok(self.resolved_state(name)?.dependent_hash)
    }

    /// Digest of the package's own bytes.
    pub fn full_hash(&self, name: &str) -> Result<Digest> {
        Ok(self.opened_state(name)?.full_hash)
    }

    /// Names of the direct dependencies, sorted.
    pub fn dependencies(&self, name: &str) -> Result<Vec<String>> {
        Ok(self.opened_state(name)?.dependencies.into_keys().collect())
    }

    pub fn classification(&self, name: &str) -> Result<Classification> {
        Ok(self.opened_state(name)?.classification)
    }

    /// Own digest of every node in the package's closure, root included.
    pub fn transitive_full_hashes(&self, name: &str) -> Result<BTreeMap<String, Digest>> {
        let root = self.lookup(name)?;
        self.resolved_state(name)?;

        let mut hashes = BTreeMap::new();
        let mut queue = VecDeque::from([root]);
        while let Some(id) = queue.pop_front() {
            let node = self.graph.node(id);
            if hashes.contains_key(node.name()) {
                continue;
            }
            let state = node.state();
            hashes.insert(node.name().to_string(), state.full_hash);
            queue.extend(state.dependencies.values().copied());
        }
        Ok(hashes)
    }

    /// Resolve each listed package, logging the ones that fail.
    pub fn determine_dependent_timestamps<S: AsRef<str>>(&self, names: &[S]) {
        for name in names {
            if let Err(e) = self.dependent_timestamp(name.as_ref()) {
                debug!("{e}");
            }
        }
    }

    /// Resolve every registered node on the calling thread.
    pub fn resolve_all(&self) {
        let resolver = self.resolver();
        for id in self.graph.ids() {
            let pending = {
                let state = self.graph.node(id).state();
                !state.hashes_resolved && state.valid && state.unresolved_dependency.is_none()
            };
            if pending {
                let closure = resolver.resolve_transitive_closure(id);
                resolver.resolve_hashes_and_timestamps(closure);
            }
        }
    }

    /// Resolve the named packages (all packages when `names` is empty) on
    /// `workers` threads. Zero workers means the configured default.
    pub fn resolve_all_concurrently<S: AsRef<str>>(
        &self,
        names: &[S],
        workers: usize,
        cancel: &CancellationToken,
    ) -> Result<ResolutionReport> {
        let roots: Vec<NodeId> = if names.is_empty() {
            self.graph.ids().collect()
        } else {
            names
                .iter()
                .filter_map(|name| {
                    let found = self.graph.lookup(name.as_ref());
                    if found.is_none() {
                        warn!("Unable to resolve package name {}", name.as_ref());
                    }
                    found
                })
                .collect()
        };

        let options = ConcurrencyOptions {
            workers: if workers == 0 { self.config.workers() } else { workers },
            deadline: self.config.resolve_timeout().map(|t| Instant::now() + t),
            cancel: cancel.clone(),
        };
        coordinator::resolve_concurrently(&self.resolver(), roots, &options)
    }

    /// Shader file with the newest timestamp, relative to the shader directory.
    pub fn newest_shader_source(&self) -> Option<&str> {
        self.newest_shader_source.as_deref()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.graph.lookup(name).is_some()
    }

    pub fn node_count(&self) -> usize {
        self.graph.len()
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }
}

fn normalized_roots(roots: &[ContentRoot]) -> Vec<ContentRoot> {
    roots
        .iter()
        .map(|root| ContentRoot::new(root.mount.clone(), root.path.clone()))
        .collect()
}
