//! Test fixtures for the traversal engine.
//!
//! `TestFs` is an in-memory stand-in for the resolver and transformer
//! collaborators: files are path-keyed dependency lists, specifiers resolve
//! to `/<name>.js`, and every transform call is logged so tests can assert
//! which modules were (not) re-transformed.

mod property_tests;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::counting_set::CountingSet;
use crate::graph::Graph;
use crate::module::{ModuleOutput, TransformResult, TransformResultDependency};
use crate::traversal::{Resolution, Resolver, TraversalOptions, Transformer};

pub(crate) fn p(path: &str) -> PathBuf {
    PathBuf::from(path)
}

pub(crate) fn dep(name: &str) -> TransformResultDependency {
    TransformResultDependency::new(name)
}

pub(crate) struct TestFs {
    files: Mutex<FxHashMap<PathBuf, Vec<TransformResultDependency>>>,
    transform_log: Mutex<Vec<PathBuf>>,
}

impl TestFs {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            files: Mutex::new(FxHashMap::default()),
            transform_log: Mutex::new(Vec::new()),
        })
    }

    /// Register a file whose dependencies are plain synchronous imports.
    pub(crate) fn set(&self, path: &str, deps: &[&str]) {
        self.set_deps(path, deps.iter().map(|name| dep(name)).collect());
    }

    /// Register a file with explicit dependency records.
    pub(crate) fn set_deps(&self, path: &str, deps: Vec<TransformResultDependency>) {
        self.files.lock().insert(p(path), deps);
    }

    /// Paths transformed since the last call to `clear_log`, in order.
    pub(crate) fn transformed(&self) -> Vec<PathBuf> {
        self.transform_log.lock().clone()
    }

    pub(crate) fn clear_log(&self) {
        self.transform_log.lock().clear();
    }

    pub(crate) fn options(self: &Arc<Self>) -> TraversalOptions {
        TraversalOptions::new(self.clone(), self.clone())
    }
}

impl Resolver for TestFs {
    fn resolve(
        &self,
        _from: &Path,
        dependency: &TransformResultDependency,
    ) -> anyhow::Result<Resolution> {
        let target = p(&format!("/{}.js", dependency.name));
        if self.files.lock().contains_key(&target) {
            Ok(Resolution::SourceFile(target))
        } else {
            anyhow::bail!("module \"{}\" does not exist", dependency.name)
        }
    }
}

#[async_trait]
impl Transformer for TestFs {
    async fn transform(
        &self,
        path: &Path,
        context: Option<&crate::context::RequireContext>,
    ) -> anyhow::Result<TransformResult> {
        self.transform_log.lock().push(path.to_path_buf());

        // Synthetic context modules have no backing file.
        if let Some(context) = context {
            return Ok(TransformResult::new(
                Vec::new(),
                vec![ModuleOutput::new(
                    "js/module",
                    serde_json::json!({ "context": context.from.display().to_string() }),
                )],
            ));
        }

        let deps = self
            .files
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("file not found: {}", path.display()))?;
        Ok(TransformResult::new(
            deps,
            vec![ModuleOutput::new(
                "js/module",
                serde_json::json!({ "code": format!("__d({:?});", path) }),
            )],
        ))
    }
}

/// Check the structural invariants the engine promises after every delta:
/// every module is reachable from an entry point, and inverse-dependency
/// counts match the forward edge multiset exactly.
pub(crate) fn assert_graph_invariants(graph: &Graph, lazy: bool) {
    // Recompute inverse dependencies from the forward edges.
    let mut expected: FxHashMap<PathBuf, CountingSet<PathBuf>> = FxHashMap::default();
    for (path, module) in &graph.dependencies {
        for dependency in module.dependencies.values() {
            if lazy && dependency.data.data.async_type.is_some() {
                continue;
            }
            if graph.dependencies.contains_key(&dependency.absolute_path) {
                expected
                    .entry(dependency.absolute_path.clone())
                    .or_default()
                    .add(path.clone());
            }
        }
    }
    for (path, module) in &graph.dependencies {
        let empty = CountingSet::new();
        let expected_inverse = expected.get(path).unwrap_or(&empty);
        assert_eq!(
            &module.inverse_dependencies,
            expected_inverse,
            "inverse dependencies out of sync for {}",
            path.display()
        );
    }

    // Reachability: walk forward edges from the entries.
    let mut reachable: Vec<PathBuf> = Vec::new();
    let mut stack: Vec<PathBuf> = graph
        .entry_points
        .iter()
        .filter(|entry| graph.dependencies.contains_key(*entry))
        .cloned()
        .collect();
    while let Some(path) = stack.pop() {
        if reachable.contains(&path) {
            continue;
        }
        reachable.push(path.clone());
        if let Some(module) = graph.dependencies.get(&path) {
            for dependency in module.dependencies.values() {
                if graph.dependencies.contains_key(&dependency.absolute_path) {
                    stack.push(dependency.absolute_path.clone());
                }
            }
        }
    }
    for path in graph.dependencies.keys() {
        assert!(
            reachable.contains(path),
            "orphaned module left in graph: {}",
            path.display()
        );
    }
}
