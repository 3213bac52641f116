//! Revision lifecycle on top of the delta bundler.
//!
//! Every successful build or update produces an immutable [`Revision`]
//! snapshot addressable by a fresh random id and by the stable [`GraphId`]
//! of the logical bundle. Both maps hold shared promise cells and are always
//! updated together: concurrent callers for one graph id converge on a
//! single in-flight build, and a failed build evicts its entries so it never
//! leaves a poisoned cache behind.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use path_clean::PathClean;
use quill_graph::{Delta, Dependencies, Module, ModuleType, TransformOptions};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::calculator::{DeltaOptions, GraphOptions};
use crate::delta_bundler::DeltaBundler;
use crate::error::{Error, Result};
use crate::graph_id::{GraphFlags, GraphId, ResolverOptions, get_graph_id};
use crate::promise::Promise;
use crate::shared_graph::SharedGraph;
use crate::watcher::ChangeEvent;

/// Opaque revision token: random hex, unique with overwhelming probability.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RevisionId(String);

impl RevisionId {
    fn random() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable snapshot of one successful build or update.
///
/// `graph` is a live handle, not a deep copy: later updates mutate the same
/// graph and produce a new `Revision` wrapper, so a holder of an old
/// revision observes stale-but-consistent module data.
#[derive(Debug, Clone)]
pub struct Revision {
    pub id: RevisionId,
    pub date: DateTime<Utc>,
    pub graph_id: GraphId,
    pub graph: SharedGraph,
    /// Polyfill/prelude modules preceding the graph's own modules in output.
    pub prepend: Vec<Module>,
}

type RevisionCell = Promise<Result<Arc<Revision>>>;

#[derive(Default)]
struct RevisionMaps {
    by_id: FxHashMap<RevisionId, RevisionCell>,
    by_graph_id: FxHashMap<GraphId, RevisionCell>,
}

/// The revision manager: identity and snapshotting on top of
/// [`DeltaBundler`], so concurrent requests for the same bundle converge and
/// clients can present a durable revision id for incremental updates later.
///
/// Cheap to clone; clones share all state. Build work runs on detached
/// tasks, so an abandoned request leaves its build to finish and be cached
/// for the next caller.
#[derive(Clone)]
pub struct IncrementalBundler {
    inner: Arc<Inner>,
}

struct Inner {
    delta_bundler: Arc<DeltaBundler>,
    project_root: PathBuf,
    prepend_paths: Vec<PathBuf>,
    /// Guards both maps so a revision is always reachable by both keys or
    /// neither.
    revisions: Mutex<RevisionMaps>,
    /// Per-graph update serialization.
    update_locks: DashMap<GraphId, Arc<tokio::sync::Mutex<()>>>,
}

impl IncrementalBundler {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self::with_prepend_scripts(project_root, Vec::<PathBuf>::new())
    }

    /// Like [`new`](Self::new), with polyfill/prelude scripts that are
    /// transformed in script mode and prepended to every bundle, in order.
    pub fn with_prepend_scripts(
        project_root: impl Into<PathBuf>,
        prepend_paths: impl IntoIterator<Item = impl Into<PathBuf>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                delta_bundler: Arc::new(DeltaBundler::new()),
                project_root: project_root.into(),
                prepend_paths: prepend_paths.into_iter().map(Into::into).collect(),
                revisions: Mutex::new(RevisionMaps::default()),
                update_locks: DashMap::new(),
            }),
        }
    }

    pub fn delta_bundler(&self) -> &Arc<DeltaBundler> {
        &self.inner.delta_bundler
    }

    /// Build (or converge on) the graph for `entry_file` and return its
    /// revision together with a full reset delta.
    ///
    /// The promise cell is stored under both the fresh revision id and the
    /// graph id *before* the build completes, so concurrent callers with the
    /// same inputs await one build. On failure both map entries are evicted
    /// before the error propagates.
    pub async fn initialize_graph(
        &self,
        entry_file: &Path,
        transform_options: TransformOptions,
        resolver_options: &ResolverOptions,
        options: GraphOptions,
    ) -> Result<(Arc<Revision>, Delta)> {
        let entry = self.inner.absolutize(entry_file);
        let graph_id = get_graph_id(
            std::slice::from_ref(&entry),
            &transform_options,
            resolver_options,
            &graph_flags(&options),
        );

        enum Role {
            Existing(RevisionCell),
            Fresh(
                crate::promise::Completer<Result<Arc<Revision>>>,
                RevisionCell,
                RevisionId,
            ),
        }

        let role = {
            let mut maps = self.inner.revisions.lock();
            match maps.by_graph_id.get(&graph_id) {
                Some(cell) => Role::Existing(cell.clone()),
                None => {
                    let (completer, promise) = Promise::pending();
                    let revision_id = RevisionId::random();
                    maps.by_id.insert(revision_id.clone(), promise.clone());
                    maps.by_graph_id.insert(graph_id.clone(), promise.clone());
                    Role::Fresh(completer, promise, revision_id)
                }
            }
        };

        let cell = match role {
            Role::Existing(cell) => cell,
            Role::Fresh(completer, promise, revision_id) => {
                // Build on a detached task: a caller that abandons the
                // request leaves the build to finish and be cached for the
                // next caller.
                let inner = Arc::clone(&self.inner);
                let task_graph_id = graph_id.clone();
                tokio::spawn(async move {
                    let result = inner
                        .build_revision(
                            entry,
                            transform_options,
                            options,
                            task_graph_id.clone(),
                            revision_id.clone(),
                        )
                        .await;
                    if result.is_err() {
                        // Do not leave a rejected cell in the cache: the next
                        // request for this graph id must trigger a fresh
                        // attempt.
                        let mut maps = inner.revisions.lock();
                        maps.by_id.remove(&revision_id);
                        maps.by_graph_id.remove(&task_graph_id);
                    }
                    completer.complete(result);
                });
                promise
            }
        };

        let revision = cell
            .wait()
            .await
            .ok_or_else(|| Error::GraphNotFound(graph_id.to_string()))??;
        let delta = full_reset_delta(&revision.graph).await;
        Ok((revision, delta))
    }

    /// Ask the graph's calculator for a delta and, if anything changed, mint
    /// a replacement revision. The old revision id stops resolving the
    /// moment the new one lands, so a stale `if-modified-since` style check
    /// can never match new content. An empty delta returns the same revision
    /// unchanged, giving callers cache-hit semantics for free.
    pub async fn update_graph(
        &self,
        revision: &Arc<Revision>,
        reset: bool,
    ) -> Result<(Arc<Revision>, Delta)> {
        let lock = self
            .inner
            .update_locks
            .entry(revision.graph_id.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let delta = self
            .inner
            .delta_bundler
            .get_delta(
                &revision.graph,
                DeltaOptions {
                    reset,
                    shallow: None,
                },
            )
            .await?;

        if delta.is_empty() && !delta.reset {
            return Ok((revision.clone(), delta));
        }

        let next = Arc::new(Revision {
            id: RevisionId::random(),
            date: Utc::now(),
            graph_id: revision.graph_id.clone(),
            graph: revision.graph.clone(),
            prepend: revision.prepend.clone(),
        });
        {
            let mut maps = self.inner.revisions.lock();
            maps.by_id.remove(&revision.id);
            maps.by_id
                .insert(next.id.clone(), Promise::resolved(Ok(next.clone())));
            maps.by_graph_id
                .insert(next.graph_id.clone(), Promise::resolved(Ok(next.clone())));
        }
        tracing::debug!("graph {} advanced to revision {}", next.graph_id, next.id);
        Ok((next, delta))
    }

    /// Look up a revision by id. Absence is an expected condition (stale
    /// client, restarted server), not an error; callers translate `None`
    /// into their own [`Error::RevisionNotFound`].
    pub async fn get_revision(&self, id: &RevisionId) -> Option<Arc<Revision>> {
        let cell = { self.inner.revisions.lock().by_id.get(id).cloned() }?;
        cell.wait().await?.ok()
    }

    /// Look up the current revision of a logical bundle.
    pub async fn get_revision_by_graph_id(&self, graph_id: &GraphId) -> Option<Arc<Revision>> {
        let cell = { self.inner.revisions.lock().by_graph_id.get(graph_id).cloned() }?;
        cell.wait().await?.ok()
    }

    /// Tear down the graph behind `graph_id` and drop both map entries.
    /// A no-op for unknown ids, supporting idempotent DELETE-style requests.
    pub async fn end_graph(&self, graph_id: &GraphId) -> Result<()> {
        let cell = { self.inner.revisions.lock().by_graph_id.get(graph_id).cloned() };
        let Some(cell) = cell else {
            return Ok(());
        };

        match cell.wait().await {
            Some(Ok(revision)) => {
                // Tolerate a concurrent end racing us through the bundler.
                match self.inner.delta_bundler.end_graph(&revision.graph) {
                    Ok(()) | Err(Error::GraphNotFound(_)) => {}
                    Err(error) => return Err(error),
                }
                let mut maps = self.inner.revisions.lock();
                maps.by_id.remove(&revision.id);
                maps.by_graph_id.remove(graph_id);
            }
            _ => {
                // The build failed or vanished; its entries are already (or
                // about to be) evicted, but drop the graph-id slot in case.
                self.inner.revisions.lock().by_graph_id.remove(graph_id);
            }
        }
        self.inner.update_locks.remove(graph_id);
        tracing::debug!("ended graph {graph_id}");
        Ok(())
    }

    /// Build a graph for ad-hoc entries without revision tracking. The
    /// caller owns the graph and must end it via the delta bundler.
    pub async fn build_graph_for_entries(
        &self,
        entry_files: &[PathBuf],
        transform_options: TransformOptions,
        options: GraphOptions,
    ) -> Result<SharedGraph> {
        let entries = self.inner.absolutize_all(entry_files);
        for entry in &entries {
            self.inner.check_entry_exists(entry).await?;
        }
        self.inner
            .delta_bundler
            .build_graph(entries, transform_options, options)
            .await
    }

    /// One-shot dependency listing; nothing is retained afterwards.
    pub async fn get_dependencies(
        &self,
        entry_files: &[PathBuf],
        transform_options: TransformOptions,
        options: GraphOptions,
    ) -> Result<Dependencies> {
        let entries = self.inner.absolutize_all(entry_files);
        for entry in &entries {
            self.inner.check_entry_exists(entry).await?;
        }
        self.inner
            .delta_bundler
            .get_dependencies(entries, transform_options, options)
            .await
    }

    /// Subscribe to change notifications for a revision's graph.
    pub fn listen(&self, graph: &SharedGraph) -> Result<broadcast::Receiver<ChangeEvent>> {
        self.inner.delta_bundler.listen(graph)
    }

    /// Tear everything down.
    pub fn end(&self) {
        self.inner.delta_bundler.end();
        let mut maps = self.inner.revisions.lock();
        maps.by_id.clear();
        maps.by_graph_id.clear();
        drop(maps);
        self.inner.update_locks.clear();
    }
}

impl Inner {
    async fn build_revision(
        &self,
        entry: PathBuf,
        transform_options: TransformOptions,
        options: GraphOptions,
        graph_id: GraphId,
        revision_id: RevisionId,
    ) -> Result<Arc<Revision>> {
        self.check_entry_exists(&entry).await?;
        let prepend = self
            .build_prepend_modules(&transform_options, &options)
            .await?;
        let graph = self
            .delta_bundler
            .build_graph(vec![entry], transform_options, options)
            .await?;
        tracing::debug!("initialized graph {graph_id} at revision {revision_id}");
        Ok(Arc::new(Revision {
            id: revision_id,
            date: Utc::now(),
            graph_id,
            graph,
            prepend,
        }))
    }

    async fn build_prepend_modules(
        &self,
        transform_options: &TransformOptions,
        options: &GraphOptions,
    ) -> Result<Vec<Module>> {
        if self.prepend_paths.is_empty() {
            return Ok(Vec::new());
        }
        let script_options = TransformOptions {
            module_type: ModuleType::Script,
            ..transform_options.clone()
        };
        let dependencies = self
            .delta_bundler
            .get_dependencies(self.prepend_paths.clone(), script_options, options.clone())
            .await?;
        Ok(dependencies.into_values().collect())
    }

    fn absolutize(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf().clean()
        } else {
            self.project_root.join(path).clean()
        }
    }

    fn absolutize_all(&self, paths: &[PathBuf]) -> Vec<PathBuf> {
        paths.iter().map(|path| self.absolutize(path)).collect()
    }

    async fn check_entry_exists(&self, path: &Path) -> Result<()> {
        // canonicalize rather than a bare existence check, to follow
        // symlinks the way the resolver will.
        tokio::fs::canonicalize(path)
            .await
            .map(|_| ())
            .map_err(|_| Error::ResourceNotFound(path.to_path_buf()))
    }
}

fn graph_flags(options: &GraphOptions) -> GraphFlags {
    GraphFlags {
        shallow: options.shallow,
        lazy: options.lazy,
        allow_require_context: options.allow_require_context,
    }
}

async fn full_reset_delta(graph: &SharedGraph) -> Delta {
    let guard = graph.read().await;
    Delta {
        added: guard.dependencies.clone(),
        reset: true,
        ..Delta::default()
    }
}
