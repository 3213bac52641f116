//! Per-graph delta calculation.
//!
//! A `DeltaCalculator` owns exactly one graph and computes deltas against it
//! over time. File-change notifications are only accumulated; no work
//! happens until the next `get_delta` call, which coalesces everything that
//! arrived in between into a single traversal.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::IndexSet;
use parking_lot::Mutex;
use quill_graph::{
    Delta, Graph, ProgressFn, Resolver, TransformOptions, Transformer, TraversalOptions,
    initial_traverse_dependencies, mark_modified_context_modules, traverse_dependencies,
};
use tokio::sync::broadcast;

use crate::error::DeltaError;
use crate::promise::Promise;
use crate::shared_graph::SharedGraph;
use crate::watcher::{ChangeEvent, WatchEvent, WatchEventKind};

/// Collaborators and traversal flags for one graph.
#[derive(Clone)]
pub struct GraphOptions {
    pub resolver: Arc<dyn Resolver>,
    pub transformer: Arc<dyn Transformer>,
    /// Only transform the entry points, do not recurse.
    pub shallow: bool,
    /// Do not eagerly follow async-import edges.
    pub lazy: bool,
    /// Permit synthetic `require.context` modules.
    pub allow_require_context: bool,
    pub on_progress: Option<ProgressFn>,
}

impl GraphOptions {
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

    fn traversal_options(&self, shallow: bool) -> TraversalOptions {
        let mut options = TraversalOptions::new(self.resolver.clone(), self.transformer.clone())
            .with_shallow(shallow)
            .with_lazy(self.lazy)
            .with_require_context(self.allow_require_context);
        if let Some(on_progress) = &self.on_progress {
            options = options.with_progress(on_progress.clone());
        }
        options
    }
}

/// Per-call options for [`DeltaCalculator::get_delta`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DeltaOptions {
    /// Force a full re-traversal; the returned delta has `reset` set and its
    /// `added` map holds the entire graph.
    pub reset: bool,
    /// Override the calculator's configured shallowness for this call.
    /// Toggling shallowness forces a reset traversal, since a shallow graph
    /// has no transitive modules to diff against.
    pub shallow: Option<bool>,
}

impl DeltaOptions {
    pub fn reset() -> Self {
        Self {
            reset: true,
            shallow: None,
        }
    }
}

#[derive(Default)]
struct Pending {
    modified: IndexSet<PathBuf>,
    deleted: IndexSet<PathBuf>,
}

type BuildResult = Result<Delta, DeltaError>;

pub struct DeltaCalculator {
    graph: SharedGraph,
    options: GraphOptions,
    pending: Mutex<Pending>,
    /// Present while a computation is running; concurrent callers await it
    /// instead of starting a second traversal.
    in_flight: Mutex<Option<Promise<BuildResult>>>,
    last_shallow: Mutex<bool>,
    change_tx: broadcast::Sender<ChangeEvent>,
    ended: AtomicBool,
}

impl DeltaCalculator {
    pub fn new(
        entry_points: impl IntoIterator<Item = PathBuf>,
        transform_options: TransformOptions,
        options: GraphOptions,
    ) -> Self {
        let (change_tx, _) = broadcast::channel(64);
        let shallow = options.shallow;
        Self {
            graph: SharedGraph::new(Graph::new(entry_points, transform_options)),
            options,
            pending: Mutex::new(Pending::default()),
            in_flight: Mutex::new(None),
            last_shallow: Mutex::new(shallow),
            change_tx,
            ended: AtomicBool::new(false),
        }
    }

    pub fn graph(&self) -> &SharedGraph {
        &self.graph
    }

    /// Subscribe to change notifications. Dropping the receiver
    /// unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.change_tx.subscribe()
    }

    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }

    /// Stop accepting work and drop accumulated invalidations.
    pub fn end(&self) {
        self.ended.store(true, Ordering::SeqCst);
        let mut pending = self.pending.lock();
        pending.modified.clear();
        pending.deleted.clear();
    }

    /// Record a batch of file events. No recomputation happens here; the
    /// paths are remembered until the next `get_delta` call, and listeners
    /// are notified that a recompute is available.
    pub fn on_file_events(&self, events: &[WatchEvent]) {
        if events.is_empty() || self.is_ended() {
            return;
        }
        {
            let mut pending = self.pending.lock();
            for event in events {
                match event.kind {
                    WatchEventKind::Delete => {
                        pending.deleted.insert(event.path.clone());
                        pending.modified.shift_remove(&event.path);
                    }
                    WatchEventKind::Add | WatchEventKind::Change => {
                        pending.modified.insert(event.path.clone());
                    }
                }
            }
        }
        tracing::trace!("{} accepted {} file events", self.graph.token(), events.len());
        let _ = self.change_tx.send(ChangeEvent);
    }

    /// Compute the delta since the previous call.
    ///
    /// At most one computation runs at a time: a caller that arrives while
    /// another is in flight receives a clone of that computation's result
    /// rather than triggering duplicate transform work.
    pub async fn get_delta(&self, options: DeltaOptions) -> Result<Delta, DeltaError> {
        if self.is_ended() {
            return Err(DeltaError::Ended);
        }

        enum Role {
            Waiter(Promise<BuildResult>),
            Builder(crate::promise::Completer<BuildResult>),
        }

        let role = {
            let mut slot = self.in_flight.lock();
            match slot.as_ref() {
                Some(promise) => Role::Waiter(promise.clone()),
                None => {
                    let (completer, promise) = Promise::pending();
                    *slot = Some(promise);
                    Role::Builder(completer)
                }
            }
        };

        match role {
            Role::Waiter(promise) => promise.wait().await.unwrap_or(Err(DeltaError::Interrupted)),
            Role::Builder(completer) => {
                let result = self.build_delta(options).await;
                *self.in_flight.lock() = None;
                completer.complete(result.clone());
                result
            }
        }
    }

    async fn build_delta(&self, options: DeltaOptions) -> BuildResult {
        // Isolate the pending sets so events arriving during the build are
        // picked up by the next call.
        let (modified, deleted) = {
            let mut pending = self.pending.lock();
            (
                std::mem::take(&mut pending.modified),
                std::mem::take(&mut pending.deleted),
            )
        };

        let shallow = options.shallow.unwrap_or(self.options.shallow);
        let shallow_toggled = {
            let mut last = self.last_shallow.lock();
            let toggled = *last != shallow;
            *last = shallow;
            toggled
        };
        let reset = options.reset || shallow_toggled;

        let mut graph = self.graph.inner().write().await;
        let result = self
            .compute(&mut graph, reset, shallow, &modified, &deleted)
            .await;
        drop(graph);

        if result.is_err() {
            // The files are still dirty: put them back so the next call
            // retries them instead of reporting an empty delta.
            let mut pending = self.pending.lock();
            for path in modified {
                pending.modified.insert(path);
            }
            for path in deleted {
                pending.deleted.insert(path);
            }
        }

        result
    }

    async fn compute(
        &self,
        graph: &mut Graph,
        reset: bool,
        shallow: bool,
        modified: &IndexSet<PathBuf>,
        deleted: &IndexSet<PathBuf>,
    ) -> BuildResult {
        let traversal = self.options.traversal_options(shallow);

        if reset && !graph.dependencies.is_empty() {
            graph.clear();
        }

        if graph.dependencies.is_empty() {
            graph.clear();
            let delta = initial_traverse_dependencies(graph, &traversal).await?;
            tracing::debug!(
                "{} full build: {} modules",
                self.graph.token(),
                delta.added.len()
            );
            return Ok(delta);
        }

        let mut invalidated: IndexSet<PathBuf> = modified.clone();

        // A deleted file invalidates everything that imports it, so the
        // importers re-resolve and surface an error if the file is still
        // referenced.
        for path in deleted {
            if let Some(module) = graph.dependencies.get(path) {
                for parent in module.inverse_dependencies.iter() {
                    invalidated.insert(parent.clone());
                }
            }
        }

        // A changed file inside a require.context directory invalidates the
        // synthetic module enumerating it, even if the graph has never seen
        // the file itself.
        for path in modified.iter().chain(deleted.iter()) {
            mark_modified_context_modules(graph, path, &mut invalidated);
        }

        // Only files that are part of the graph can produce a delta.
        let to_traverse: Vec<PathBuf> = invalidated
            .iter()
            .filter(|path| graph.dependencies.contains_key(*path))
            .cloned()
            .collect();

        if to_traverse.is_empty() {
            return Ok(Delta::default());
        }

        let delta = traverse_dependencies(&to_traverse, graph, &traversal).await?;
        tracing::debug!(
            "{} delta: +{} ~{} -{}",
            self.graph.token(),
            delta.added.len(),
            delta.modified.len(),
            delta.deleted.len()
        );
        Ok(delta)
    }
}
