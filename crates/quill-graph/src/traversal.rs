//! Dependency traversal for the delta engine.
//!
//! Calculates the modules that belong in a bundle by walking the dependency
//! graph. Instead of re-walking the whole graph on every change, it only
//! traverses from the modified files and records the difference as a delta,
//! mutating the passed graph in place. A failed traversal restores the graph
//! to its pre-call state, so no partial mutation is ever observable.
//!
//! Unreachable-module collection is based on the synchronous cycle
//! collection algorithm described in:
//!
//! David F. Bacon and V. T. Rajan. 2001. Concurrent Cycle Collection in
//! Reference Counted Systems. ECOOP '01.
//!
//! Notable differences from the paper: a module's reference count is the
//! size of its inverse-dependency set (plus one if it is an entry point),
//! and the root buffer is kept duplicate-free by using a set.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::{IndexMap, IndexSet};

use crate::context::{
    RequireContext, compile_context_filter, derive_absolute_path_from_context,
    file_matches_context,
};
use crate::error::TraversalError;
use crate::graph::{Delta, Graph, NodeColor};
use crate::module::{Dependency, Module, TransformResult, TransformResultDependency};

/// Maps an import specifier to a file on disk.
///
/// Must be deterministic for a fixed file-system snapshot; the engine calls
/// it once per dependency edge of every (re)transformed module.
pub trait Resolver: Send + Sync {
    fn resolve(
        &self,
        from: &Path,
        dependency: &TransformResultDependency,
    ) -> anyhow::Result<Resolution>;
}

/// A successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    SourceFile(PathBuf),
}

/// Parses and transforms a single file.
///
/// Called once per newly-added-or-modified module per traversal; safe to call
/// concurrently for different paths. For synthetic context modules the
/// resolved context is passed along so the transformer can enumerate the
/// matched files.
#[async_trait]
pub trait Transformer: Send + Sync {
    async fn transform(
        &self,
        path: &Path,
        context: Option<&RequireContext>,
    ) -> anyhow::Result<TransformResult>;
}

/// Progress callback: `(num_processed, total_discovered)`.
pub type ProgressFn = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Options controlling one graph's traversals.
#[derive(Clone)]
pub struct TraversalOptions {
    pub resolver: Arc<dyn Resolver>,
    pub transformer: Arc<dyn Transformer>,
    /// Only transform the entry points, do not recurse.
    pub shallow: bool,
    /// Do not follow async-import edges eagerly; their targets become
    /// separate bundles tracked in `Graph::import_bundle_names`.
    pub lazy: bool,
    /// Permit synthetic `require.context` modules.
    pub allow_require_context: bool,
    pub on_progress: Option<ProgressFn>,
}

impl TraversalOptions {
    pub fn new(resolver: Arc<dyn Resolver>, transformer: Arc<dyn Transformer>) -> Self {
        Self {
            resolver,
            transformer,
            shallow: false,
            lazy: false,
            allow_require_context: false,
            on_progress: None,
        }
    }

    pub fn with_shallow(mut self, shallow: bool) -> Self {
        self.shallow = shallow;
        self
    }

    pub fn with_lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    pub fn with_require_context(mut self, allow: bool) -> Self {
        self.allow_require_context = allow;
        self
    }

    pub fn with_progress(mut self, on_progress: ProgressFn) -> Self {
        self.on_progress = Some(on_progress);
        self
    }
}

/// Per-pass traversal bookkeeping. Tracks which paths changed so the final
/// delta can report added modules separately from modified ones.
#[derive(Default)]
struct InternalDelta {
    added: IndexSet<PathBuf>,
    modified: IndexSet<PathBuf>,
    deleted: IndexSet<PathBuf>,
}

struct TraversalCtx<'o> {
    options: &'o TraversalOptions,
    /// Chain of modules from the entry point to the one currently being
    /// processed, for import-stack diagnostics.
    import_stack: Vec<PathBuf>,
    num_processed: usize,
    total: usize,
}

impl<'o> TraversalCtx<'o> {
    fn new(options: &'o TraversalOptions) -> Self {
        Self {
            options,
            import_stack: Vec::new(),
            num_processed: 0,
            total: 0,
        }
    }

    fn on_dependency_add(&mut self) {
        self.total += 1;
        if let Some(on_progress) = &self.options.on_progress {
            on_progress(self.num_processed, self.total);
        }
    }

    fn on_dependency_added(&mut self) {
        self.num_processed += 1;
        if let Some(on_progress) = &self.options.on_progress {
            on_progress(self.num_processed, self.total);
        }
    }
}

/// Build a graph from scratch by traversing every entry point.
///
/// The graph must be empty. Returns a reset delta whose `added` map is the
/// entire module set, in deterministic DFS order from the entries.
pub async fn initial_traverse_dependencies(
    graph: &mut Graph,
    options: &TraversalOptions,
) -> Result<Delta, TraversalError> {
    debug_assert!(
        graph.dependencies.is_empty() && graph.import_bundle_names.is_empty(),
        "initial traversal requires an empty graph"
    );

    let checkpoint = graph.checkpoint();
    let mut delta = InternalDelta::default();
    let mut ctx = TraversalCtx::new(options);

    match run_initial(graph, &mut delta, &mut ctx).await {
        Ok(()) => Ok(Delta {
            added: graph.dependencies.clone(),
            modified: IndexMap::new(),
            deleted: IndexSet::new(),
            reset: true,
        }),
        Err(error) => {
            graph.restore(checkpoint);
            Err(error)
        }
    }
}

async fn run_initial(
    graph: &mut Graph,
    delta: &mut InternalDelta,
    ctx: &mut TraversalCtx<'_>,
) -> Result<(), TraversalError> {
    // Each entry point implicitly has a refcount of 1, so mark them all
    // black.
    for entry in graph.entry_points.clone() {
        graph.state.color.insert(entry, NodeColor::Black);
    }

    let entries: Vec<PathBuf> = graph.entry_points.iter().cloned().collect();
    for entry in entries {
        ctx.on_dependency_add();
        process_module(entry, graph, delta, ctx).await?;
        ctx.on_dependency_added();
    }

    // Re-walk from the entries so repeated fresh builds of the same tree
    // yield identical module-map order.
    reorder_graph(graph, ctx.options.shallow)
}

/// Traverse from a set of already-known (modified) module paths and return
/// the delta against the graph's previous state.
///
/// Paths that are not part of the graph are ignored. On error the graph is
/// restored to its state before the call.
pub async fn traverse_dependencies(
    paths: &[PathBuf],
    graph: &mut Graph,
    options: &TraversalOptions,
) -> Result<Delta, TraversalError> {
    let checkpoint = graph.checkpoint();
    let mut delta = InternalDelta::default();
    let mut ctx = TraversalCtx::new(options);

    match run_incremental(paths, graph, &mut delta, &mut ctx).await {
        Ok(result) => Ok(result),
        Err(error) => {
            graph.restore(checkpoint);
            Err(error)
        }
    }
}

async fn run_incremental(
    paths: &[PathBuf],
    graph: &mut Graph,
    delta: &mut InternalDelta,
    ctx: &mut TraversalCtx<'_>,
) -> Result<Delta, TraversalError> {
    for path in paths {
        // Only start from modules that are already part of the graph.
        if graph.dependencies.contains_key(path) {
            delta.modified.insert(path.clone());
            ctx.on_dependency_add();
            process_module(path.clone(), graph, delta, ctx).await?;
            ctx.on_dependency_added();
        }
    }

    collect_cycles(graph, delta, ctx.options.lazy);

    let mut added = IndexMap::new();
    for path in &delta.added {
        let module = graph
            .dependencies
            .get(path)
            .ok_or_else(|| TraversalError::MissingModule { path: path.clone() })?;
        added.insert(path.clone(), module.clone());
    }

    let mut modified = IndexMap::new();
    for path in &delta.modified {
        // Only report a module as modified if it is not already reported as
        // added.
        if delta.added.contains(path) {
            continue;
        }
        let module = graph
            .dependencies
            .get(path)
            .ok_or_else(|| TraversalError::MissingModule { path: path.clone() })?;
        modified.insert(path.clone(), module.clone());
    }

    Ok(Delta {
        added,
        modified,
        deleted: std::mem::take(&mut delta.deleted),
        reset: false,
    })
}

fn process_module<'a, 'o: 'a>(
    path: PathBuf,
    graph: &'a mut Graph,
    delta: &'a mut InternalDelta,
    ctx: &'a mut TraversalCtx<'o>,
) -> Pin<Box<dyn Future<Output = Result<(), TraversalError>> + Send + 'a>> {
    Box::pin(async move {
        ctx.import_stack.push(path.clone());
        let result = process_module_inner(path, graph, delta, ctx).await;
        ctx.import_stack.pop();
        result
    })
}

async fn process_module_inner(
    path: PathBuf,
    graph: &mut Graph,
    delta: &mut InternalDelta,
    ctx: &mut TraversalCtx<'_>,
) -> Result<(), TraversalError> {
    let resolved_context = graph.state.resolved_contexts.get(&path).cloned();

    let result = ctx
        .options
        .transformer
        .transform(&path, resolved_context.as_ref())
        .await
        .map_err(|cause| TraversalError::Transform {
            path: path.clone(),
            import_stack: ctx.import_stack.clone(),
            cause: Arc::new(cause),
        })?;

    let current_dependencies = resolve_dependencies(graph, &path, &result.dependencies, ctx)?;

    // Register or refresh the node before visiting children so that cycle
    // back-edges find it in the graph.
    let previous_dependencies = match graph.dependencies.get_mut(&path) {
        Some(module) => {
            module.output = result.output.clone();
            module.get_source = result.get_source.clone();
            module.dependencies.clone()
        }
        None => {
            graph.dependencies.insert(
                path.clone(),
                Module::new(path.clone(), result.output.clone(), result.get_source.clone()),
            );
            IndexMap::new()
        }
    };

    // Diff dependencies (1/2): drop edges that changed or disappeared.
    for (key, previous) in &previous_dependencies {
        let stale = match current_dependencies.get(key) {
            Some(current) => !dependencies_equal(previous, current, ctx.options.lazy),
            None => true,
        };
        if stale {
            remove_dependency(&path, key, previous, graph, delta, ctx.options.lazy);
        }
    }

    // Diff dependencies (2/2): wire up edges that changed or appeared, in
    // declaration order.
    for (key, current) in &current_dependencies {
        let fresh = match previous_dependencies.get(key) {
            Some(previous) => !dependencies_equal(previous, current, ctx.options.lazy),
            None => true,
        };
        if fresh {
            add_dependency(&path, key.clone(), current.clone(), graph, delta, ctx).await?;
        }
    }

    // Replace the map with the declaration-ordered version. The incremental
    // updates above added and removed exactly the differing edges, so this
    // only fixes ordering.
    let module = graph
        .dependencies
        .get_mut(&path)
        .ok_or_else(|| TraversalError::MissingModule { path: path.clone() })?;
    debug_assert_eq!(module.dependencies.len(), current_dependencies.len());
    module.dependencies = current_dependencies;

    Ok(())
}

fn dependencies_equal(a: &Dependency, b: &Dependency, lazy: bool) -> bool {
    a.absolute_path == b.absolute_path
        && (!lazy || a.data.data.async_type == b.data.data.async_type)
        && a.data.data.context_params == b.data.data.context_params
}

async fn add_dependency(
    parent: &Path,
    key: String,
    dependency: Dependency,
    graph: &mut Graph,
    delta: &mut InternalDelta,
    ctx: &mut TraversalCtx<'_>,
) -> Result<(), TraversalError> {
    let path = dependency.absolute_path.clone();

    if ctx.options.shallow {
        // Single-module build: record the edge but do not add a node.
    } else if ctx.options.lazy && dependency.data.data.async_type.is_some() {
        // Async edge under lazy traversal: the target becomes its own
        // bundle instead of a node in this graph.
        increment_import_bundle_ref(&path, graph);
    } else {
        if !graph.dependencies.contains_key(&path) {
            if delta.deleted.shift_remove(&path) {
                // Re-added within this pass: the pending deletion cancels
                // out.
            } else {
                delta.added.insert(path.clone());
                delta.modified.shift_remove(&path);
            }
            ctx.on_dependency_add();
            process_module(path.clone(), graph, delta, ctx).await?;
            ctx.on_dependency_added();
        }
        if let Some(module) = graph.dependencies.get_mut(&path) {
            module.inverse_dependencies.add(parent.to_path_buf());
            graph.state.color.insert(path.clone(), NodeColor::Black);
        }
    }

    // Always record the edge on the parent, even when no node was added for
    // the child (shallow builds, lazy async edges).
    if let Some(parent_module) = graph.dependencies.get_mut(parent) {
        parent_module.dependencies.insert(key, dependency);
    }

    Ok(())
}

fn remove_dependency(
    parent: &Path,
    key: &str,
    dependency: &Dependency,
    graph: &mut Graph,
    delta: &mut InternalDelta,
    lazy: bool,
) {
    if let Some(parent_module) = graph.dependencies.get_mut(parent) {
        parent_module.dependencies.shift_remove(key);
    }

    let absolute_path = &dependency.absolute_path;

    if lazy && dependency.data.data.async_type.is_some() {
        // Async edges never contributed an inverse dependency, only an
        // import-bundle reference.
        decrement_import_bundle_ref(absolute_path, graph);
        return;
    }

    let Some(module) = graph.dependencies.get_mut(absolute_path) else {
        return;
    };
    module.inverse_dependencies.remove(parent);
    let keep = !module.inverse_dependencies.is_empty() || graph.entry_points.contains(absolute_path);

    if keep {
        // The reference count decreased but not to zero; the module may now
        // be part of an unreachable cycle. NOTE: entry points implicitly
        // hold one reference.
        mark_as_possible_cycle_root(absolute_path, graph);
    } else {
        release_module(absolute_path.clone(), graph, delta, lazy);
    }
}

fn resolve_dependencies(
    graph: &mut Graph,
    parent_path: &Path,
    dependencies: &[TransformResultDependency],
    ctx: &TraversalCtx<'_>,
) -> Result<IndexMap<String, Dependency>, TraversalError> {
    let mut resolved = IndexMap::new();

    for dependency in dependencies {
        let key = dependency.data.key.clone();
        if resolved.contains_key(&key) {
            return Err(TraversalError::DuplicateDependencyKey {
                key,
                path: parent_path.to_path_buf(),
            });
        }

        if let Some(context_params) = &dependency.data.context_params {
            if !ctx.options.allow_require_context {
                return Err(TraversalError::ContextNotAllowed {
                    path: parent_path.to_path_buf(),
                });
            }
            let from = parent_path
                .parent()
                .unwrap_or_else(|| Path::new("/"))
                .join(&dependency.name);
            let absolute_path = derive_absolute_path_from_context(&from, context_params);
            let filter = compile_context_filter(context_params).map_err(|cause| {
                TraversalError::InvalidContextFilter {
                    pattern: context_params.filter.pattern.clone(),
                    path: parent_path.to_path_buf(),
                    cause: Arc::new(cause),
                }
            })?;
            graph.state.resolved_contexts.insert(
                absolute_path.clone(),
                RequireContext {
                    from,
                    recursive: context_params.recursive,
                    filter,
                    mode: context_params.mode,
                },
            );
            resolved.insert(
                key,
                Dependency {
                    absolute_path,
                    data: dependency.clone(),
                },
            );
            continue;
        }

        match ctx.options.resolver.resolve(parent_path, dependency) {
            Ok(Resolution::SourceFile(file_path)) => {
                // The target may have been a require.context module in a
                // previous version of the parent.
                graph.state.resolved_contexts.remove(&file_path);
                resolved.insert(
                    key,
                    Dependency {
                        absolute_path: file_path,
                        data: dependency.clone(),
                    },
                );
            }
            Err(cause) => {
                // Unavailable optional dependencies are guarded with a
                // try/catch in source and handled at runtime.
                if dependency.data.is_optional {
                    continue;
                }
                return Err(TraversalError::Resolve {
                    specifier: dependency.name.clone(),
                    from: parent_path.to_path_buf(),
                    import_stack: ctx.import_stack.clone(),
                    cause: Arc::new(cause),
                });
            }
        }
    }

    Ok(resolved)
}

/// Re-walk the graph in DFS order from the entry points and rebuild the
/// module map in that order, so iteration order is identical between runs.
pub fn reorder_graph(graph: &mut Graph, shallow: bool) -> Result<(), TraversalError> {
    let mut ordered = IndexMap::with_capacity(graph.dependencies.len());

    for entry in graph.entry_points.clone() {
        reorder_dependencies(graph, &entry, &mut ordered, shallow)?;
    }

    graph.dependencies = ordered;
    Ok(())
}

fn reorder_dependencies(
    graph: &Graph,
    path: &Path,
    ordered: &mut IndexMap<PathBuf, Module>,
    shallow: bool,
) -> Result<(), TraversalError> {
    if ordered.contains_key(path) {
        return Ok(());
    }
    let module = graph
        .dependencies
        .get(path)
        .ok_or_else(|| TraversalError::MissingModule {
            path: path.to_path_buf(),
        })?;
    ordered.insert(path.to_path_buf(), module.clone());

    for dependency in module.dependencies.values() {
        if !graph.dependencies.contains_key(&dependency.absolute_path) {
            if dependency.data.data.async_type.is_some() || shallow {
                continue;
            }
            return Err(TraversalError::MissingModule {
                path: dependency.absolute_path.clone(),
            });
        }
        reorder_dependencies(graph, &dependency.absolute_path, ordered, shallow)?;
    }

    Ok(())
}

/// Record the context modules whose file set includes `file_path`, so a
/// change to a file the graph has never seen can still invalidate the
/// synthetic module enumerating its directory.
pub fn mark_modified_context_modules(
    graph: &Graph,
    file_path: &Path,
    modified_paths: &mut IndexSet<PathBuf>,
) {
    for (absolute_path, context) in &graph.state.resolved_contexts {
        if !modified_paths.contains(absolute_path) && file_matches_context(file_path, context) {
            modified_paths.insert(absolute_path.clone());
        }
    }
}

// ---------------------------------------------------------------------------
// Garbage collection
// ---------------------------------------------------------------------------

fn color_of(graph: &Graph, path: &Path) -> NodeColor {
    graph
        .state
        .color
        .get(path)
        .copied()
        .unwrap_or(NodeColor::Black)
}

/// Child paths considered for GC purposes. Async edges are excluded under
/// lazy traversal: they never contributed inverse-dependency references.
fn gc_child_paths(graph: &Graph, path: &Path, lazy: bool) -> Vec<PathBuf> {
    graph
        .dependencies
        .get(path)
        .map(|module| {
            module
                .dependencies
                .values()
                .filter(|dependency| !(lazy && dependency.data.data.async_type.is_some()))
                .map(|dependency| dependency.absolute_path.clone())
                .collect()
        })
        .unwrap_or_default()
}

fn increment_import_bundle_ref(path: &Path, graph: &mut Graph) {
    *graph
        .state
        .import_bundle_refs
        .entry(path.to_path_buf())
        .or_insert(0) += 1;
    graph.import_bundle_names.insert(path.to_path_buf());
}

fn decrement_import_bundle_ref(path: &Path, graph: &mut Graph) {
    let Some(count) = graph.state.import_bundle_refs.get_mut(path) else {
        return;
    };
    if *count <= 1 {
        graph.state.import_bundle_refs.remove(path);
        graph.import_bundle_names.shift_remove(path);
    } else {
        *count -= 1;
    }
}

/// Delete an unreachable module immediately, unless it is queued as a
/// potential cycle root. Drops the module's outbound edges first.
///
/// Called when a module's reference count reaches zero.
fn release_module(path: PathBuf, graph: &mut Graph, delta: &mut InternalDelta, lazy: bool) {
    let edges: Vec<(String, Dependency)> = graph
        .dependencies
        .get(&path)
        .map(|module| {
            module
                .dependencies
                .iter()
                .map(|(key, dependency)| (key.clone(), dependency.clone()))
                .collect()
        })
        .unwrap_or_default();

    for (key, dependency) in &edges {
        remove_dependency(&path, key, dependency, graph, delta, lazy);
    }

    graph.state.color.insert(path.clone(), NodeColor::Black);
    if !graph.state.possible_cycle_roots.contains(&path) {
        free_module(&path, graph, delta);
    }
}

/// Delete an unreachable module from the graph and clean up every piece of
/// state associated with it, so it can be re-added correctly later.
fn free_module(path: &Path, graph: &mut Graph, delta: &mut InternalDelta) {
    if !delta.added.shift_remove(path) {
        delta.deleted.insert(path.to_path_buf());
        delta.modified.shift_remove(path);
    }

    graph.dependencies.shift_remove(path);
    graph.state.possible_cycle_roots.shift_remove(path);
    graph.state.color.remove(path);
    graph.state.resolved_contexts.remove(path);
}

fn mark_as_possible_cycle_root(path: &Path, graph: &mut Graph) {
    if color_of(graph, path) != NodeColor::Purple {
        graph
            .state
            .color
            .insert(path.to_path_buf(), NodeColor::Purple);
        graph.state.possible_cycle_roots.insert(path.to_path_buf());
    }
}

/// Collect any unreachable cycles left behind by this pass.
fn collect_cycles(graph: &mut Graph, delta: &mut InternalDelta, lazy: bool) {
    // Mark recursively from roots (trial deletion).
    let roots: Vec<PathBuf> = graph.state.possible_cycle_roots.iter().cloned().collect();
    for path in roots {
        if !graph.state.possible_cycle_roots.contains(&path) {
            continue;
        }
        let color = color_of(graph, &path);
        if color == NodeColor::Purple {
            mark_gray(&path, graph, lazy);
        } else {
            graph.state.possible_cycle_roots.shift_remove(&path);
            if color == NodeColor::Black
                && graph
                    .dependencies
                    .get(&path)
                    .is_some_and(|module| module.inverse_dependencies.is_empty())
                && !graph.entry_points.contains(&path)
            {
                free_module(&path, graph, delta);
            }
        }
    }

    // Scan recursively from roots (undo unsuccessful trial deletions).
    let roots: Vec<PathBuf> = graph.state.possible_cycle_roots.iter().cloned().collect();
    for path in roots {
        scan(&path, graph, lazy);
    }

    // Collect recursively from roots (free unreachable cycles).
    while let Some(path) = graph.state.possible_cycle_roots.shift_remove_index(0) {
        collect_white(&path, graph, delta, lazy);
    }
}

fn mark_gray(path: &Path, graph: &mut Graph, lazy: bool) {
    if color_of(graph, path) == NodeColor::Gray {
        return;
    }
    graph.state.color.insert(path.to_path_buf(), NodeColor::Gray);
    for child in gc_child_paths(graph, path, lazy) {
        if let Some(child_module) = graph.dependencies.get_mut(&child) {
            // The inverse dependency is restored during the scan phase if
            // this module turns out to be live.
            child_module.inverse_dependencies.remove(path);
        } else {
            continue;
        }
        mark_gray(&child, graph, lazy);
    }
}

fn scan(path: &Path, graph: &mut Graph, lazy: bool) {
    if color_of(graph, path) != NodeColor::Gray {
        return;
    }
    let live = graph
        .dependencies
        .get(path)
        .is_some_and(|module| !module.inverse_dependencies.is_empty())
        || graph.entry_points.contains(path);
    if live {
        scan_black(path, graph, lazy);
    } else {
        graph
            .state
            .color
            .insert(path.to_path_buf(), NodeColor::White);
        for child in gc_child_paths(graph, path, lazy) {
            if graph.dependencies.contains_key(&child) {
                scan(&child, graph, lazy);
            }
        }
    }
}

fn scan_black(path: &Path, graph: &mut Graph, lazy: bool) {
    graph
        .state
        .color
        .insert(path.to_path_buf(), NodeColor::Black);
    for child in gc_child_paths(graph, path, lazy) {
        if let Some(child_module) = graph.dependencies.get_mut(&child) {
            // The inverse dependency was deleted during the mark phase.
            child_module.inverse_dependencies.add(path.to_path_buf());
        } else {
            continue;
        }
        if color_of(graph, &child) != NodeColor::Black {
            scan_black(&child, graph, lazy);
        }
    }
}

fn collect_white(path: &Path, graph: &mut Graph, delta: &mut InternalDelta, lazy: bool) {
    if color_of(graph, path) == NodeColor::White && !graph.state.possible_cycle_roots.contains(path)
    {
        graph
            .state
            .color
            .insert(path.to_path_buf(), NodeColor::Black);
        for child in gc_child_paths(graph, path, lazy) {
            // The child may already have been collected.
            if graph.dependencies.contains_key(&child) {
                collect_white(&child, graph, delta, lazy);
            }
        }
        free_module(path, graph, delta);
    }
}
