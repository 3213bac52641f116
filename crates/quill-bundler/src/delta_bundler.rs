//! Multi-graph registry.
//!
//! Maps live graphs to the calculator that owns them, and fans the single
//! upstream stream of file-watcher events out to every registered
//! calculator. Consumers identify graphs by [`SharedGraph`] handle; a lookup
//! for a graph that was never registered (or already ended) fails with the
//! distinct [`Error::GraphNotFound`] kind so callers can tell an expired
//! session apart from an internal error.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use quill_graph::{Delta, Dependencies, TransformOptions};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::calculator::{DeltaCalculator, DeltaOptions, GraphOptions};
use crate::error::{Error, Result};
use crate::shared_graph::{GraphToken, SharedGraph};
use crate::watcher::{ChangeEvent, WatchEvent};

pub struct DeltaBundler {
    calculators: Arc<DashMap<GraphToken, Arc<DeltaCalculator>>>,
    watcher_task: Mutex<Option<JoinHandle<()>>>,
}

impl DeltaBundler {
    pub fn new() -> Self {
        Self {
            calculators: Arc::new(DashMap::new()),
            watcher_task: Mutex::new(None),
        }
    }

    /// Build a graph and register it for incremental updates. The caller is
    /// responsible for eventually calling [`end_graph`](Self::end_graph).
    pub async fn build_graph(
        &self,
        entry_points: Vec<PathBuf>,
        transform_options: TransformOptions,
        options: GraphOptions,
    ) -> Result<SharedGraph> {
        let calculator = Arc::new(DeltaCalculator::new(entry_points, transform_options, options));
        calculator.get_delta(DeltaOptions::reset()).await?;
        let graph = calculator.graph().clone();
        self.calculators.insert(graph.token(), calculator);
        tracing::debug!("registered {}", graph.token());
        Ok(graph)
    }

    /// One-shot dependency listing: builds the graph, extracts its module
    /// map, and immediately ends the calculator so fire-and-forget queries
    /// don't leak long-lived graphs.
    pub async fn get_dependencies(
        &self,
        entry_points: Vec<PathBuf>,
        transform_options: TransformOptions,
        options: GraphOptions,
    ) -> Result<Dependencies> {
        let calculator = DeltaCalculator::new(entry_points, transform_options, options);
        calculator.get_delta(DeltaOptions::reset()).await?;
        let dependencies = calculator.graph().read().await.dependencies.clone();
        calculator.end();
        Ok(dependencies)
    }

    /// Compute a delta for a registered graph.
    pub async fn get_delta(&self, graph: &SharedGraph, options: DeltaOptions) -> Result<Delta> {
        let calculator = self.calculator(graph)?;
        Ok(calculator.get_delta(options).await?)
    }

    /// Subscribe to a graph's change notifications. Dropping the receiver
    /// removes the subscription.
    pub fn listen(&self, graph: &SharedGraph) -> Result<broadcast::Receiver<ChangeEvent>> {
        Ok(self.calculator(graph)?.subscribe())
    }

    /// Forward a batch of file events to every live calculator. Each one
    /// decides for itself whether the paths affect its graph.
    pub fn notify(&self, events: &[WatchEvent]) {
        for entry in self.calculators.iter() {
            entry.value().on_file_events(events);
        }
    }

    /// Drive [`notify`](Self::notify) from a broadcast channel of event
    /// batches. Replaces any previously attached watcher; shut down by
    /// [`end`](Self::end).
    pub fn attach_watcher(&self, mut events: broadcast::Receiver<Vec<WatchEvent>>) {
        let calculators = Arc::clone(&self.calculators);
        let handle = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(batch) => {
                        for entry in calculators.iter() {
                            entry.value().on_file_events(&batch);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("file watcher lagged, dropped {skipped} event batches");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        if let Some(previous) = self.watcher_task.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Deregister a graph and end its calculator.
    pub fn end_graph(&self, graph: &SharedGraph) -> Result<()> {
        let (_, calculator) = self
            .calculators
            .remove(&graph.token())
            .ok_or_else(|| Error::GraphNotFound(graph.token().to_string()))?;
        calculator.end();
        tracing::debug!("ended {}", graph.token());
        Ok(())
    }

    /// End every registered calculator. Used at process shutdown.
    pub fn end(&self) {
        if let Some(task) = self.watcher_task.lock().take() {
            task.abort();
        }
        for entry in self.calculators.iter() {
            entry.value().end();
        }
        self.calculators.clear();
    }

    fn calculator(&self, graph: &SharedGraph) -> Result<Arc<DeltaCalculator>> {
        self.calculators
            .get(&graph.token())
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::GraphNotFound(graph.token().to_string()))
    }
}

impl Default for DeltaBundler {
    fn default() -> Self {
        Self::new()
    }
}
