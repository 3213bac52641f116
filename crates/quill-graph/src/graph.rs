//! The mutable module graph and the delta record describing its changes.

use std::collections::BTreeMap;
use std::path::PathBuf;

use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::context::RequireContext;
use crate::module::Module;

/// Whether modules are built as wrapped modules or plain scripts. Scripts are
/// used for polyfills and preludes that run before the module system exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleType {
    #[default]
    Module,
    Script,
}

/// Options that feed the transformer and therefore define a graph's identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformOptions {
    pub platform: Option<String>,
    pub dev: bool,
    pub hot: bool,
    pub minify: bool,
    pub module_type: ModuleType,
    /// Free-form caller options, forwarded to the transformer untouched.
    /// Key-sorted by construction so identity hashing stays order-free.
    pub custom: BTreeMap<String, serde_json::Value>,
}

impl TransformOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    pub fn with_dev(mut self, dev: bool) -> Self {
        self.dev = dev;
        self
    }

    pub fn with_hot(mut self, hot: bool) -> Self {
        self.hot = hot;
        self
    }

    pub fn with_minify(mut self, minify: bool) -> Self {
        self.minify = minify;
        self
    }

    pub fn with_module_type(mut self, module_type: ModuleType) -> Self {
        self.module_type = module_type;
        self
    }

    pub fn with_custom(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.custom.insert(key.into(), value);
        self
    }
}

/// Garbage-collection color of a graph node, per the synchronous
/// cycle-collection algorithm (Bacon & Rajan 2001).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeColor {
    /// In use (or freshly freed).
    Black,
    /// Possible member of a garbage cycle.
    Gray,
    /// Member of a garbage cycle.
    White,
    /// Possible root of a garbage cycle.
    Purple,
}

/// Traversal bookkeeping that persists between delta computations but is not
/// part of the graph's public shape.
#[derive(Debug, Clone, Default)]
pub(crate) struct PrivateState {
    /// Resolved `require.context` parameters keyed by synthetic module path.
    pub resolved_contexts: FxHashMap<PathBuf, RequireContext>,
    /// GC state for nodes in `dependencies`.
    pub color: FxHashMap<PathBuf, NodeColor>,
    pub possible_cycle_roots: IndexSet<PathBuf>,
    /// Reference counts for entries in `import_bundle_names`.
    pub import_bundle_refs: FxHashMap<PathBuf, usize>,
}

/// The mutable dependency graph for one entry-point/options combination.
///
/// Invariant: every module in `dependencies` is reachable from some entry
/// point by following forward edges; unreachable modules are pruned during
/// delta computation.
#[derive(Debug, Clone)]
pub struct Graph {
    /// Absolute paths traversal starts from, in order.
    pub entry_points: IndexSet<PathBuf>,
    /// All modules in the graph, keyed by absolute path. After the initial
    /// build the iteration order is a deterministic DFS from the entries.
    pub dependencies: IndexMap<PathBuf, Module>,
    /// Paths reached only across dynamic-import boundaries when async edges
    /// are traversed lazily.
    pub import_bundle_names: IndexSet<PathBuf>,
    pub transform_options: TransformOptions,
    pub(crate) state: PrivateState,
}

impl Graph {
    pub fn new(
        entry_points: impl IntoIterator<Item = PathBuf>,
        transform_options: TransformOptions,
    ) -> Self {
        Self {
            entry_points: entry_points.into_iter().collect(),
            dependencies: IndexMap::new(),
            import_bundle_names: IndexSet::new(),
            transform_options,
            state: PrivateState::default(),
        }
    }

    /// Drop every module and all traversal bookkeeping, keeping the entry
    /// points and transform options. Used before a forced full re-traversal.
    pub fn clear(&mut self) {
        self.dependencies.clear();
        self.import_bundle_names.clear();
        self.state = PrivateState::default();
    }

    /// Snapshot of the mutable portion of the graph, for rollback when a
    /// traversal fails partway through.
    pub(crate) fn checkpoint(&self) -> GraphCheckpoint {
        GraphCheckpoint {
            dependencies: self.dependencies.clone(),
            import_bundle_names: self.import_bundle_names.clone(),
            state: self.state.clone(),
        }
    }

    pub(crate) fn restore(&mut self, checkpoint: GraphCheckpoint) {
        self.dependencies = checkpoint.dependencies;
        self.import_bundle_names = checkpoint.import_bundle_names;
        self.state = checkpoint.state;
    }
}

pub(crate) struct GraphCheckpoint {
    dependencies: IndexMap<PathBuf, Module>,
    import_bundle_names: IndexSet<PathBuf>,
    state: PrivateState,
}

/// A graph's module map: absolute path to module, in deterministic order.
pub type Dependencies = IndexMap<PathBuf, Module>;

/// The set of changes between two points in a graph's history.
///
/// A path appears in at most one of `added`/`modified`/`deleted`. When
/// `reset` is true the delta represents a full build and `added` holds the
/// entire module set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Delta {
    pub added: IndexMap<PathBuf, Module>,
    pub modified: IndexMap<PathBuf, Module>,
    pub deleted: IndexSet<PathBuf>,
    pub reset: bool,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_keeps_entries_and_options() {
        let options = TransformOptions::new().with_platform("ios").with_dev(true);
        let mut graph = Graph::new([PathBuf::from("/entry.js")], options.clone());
        graph
            .import_bundle_names
            .insert(PathBuf::from("/lazy.js"));
        graph.clear();
        assert!(graph.dependencies.is_empty());
        assert!(graph.import_bundle_names.is_empty());
        assert_eq!(graph.transform_options, options);
        assert!(graph.entry_points.contains(&PathBuf::from("/entry.js")));
    }

    #[test]
    fn empty_delta_is_empty() {
        let delta = Delta::default();
        assert!(delta.is_empty());
    }
}
