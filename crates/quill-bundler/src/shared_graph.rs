//! Shared ownership of a mutating graph.
//!
//! A graph is mutated in place by its calculator while any number of
//! revisions (and their readers) hold references to it. `SharedGraph` makes
//! that aliasing explicit: a reference-counted handle with single-writer
//! discipline enforced by an async read-write lock, so readers always see a
//! consistent (possibly stale) state and never a half-applied mutation.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use quill_graph::Graph;
use tokio::sync::{RwLock, RwLockReadGuard};

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a graph, independent of its contents. This is
/// what the delta bundler keys its calculator registry by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GraphToken(u64);

impl fmt::Display for GraphToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "graph#{}", self.0)
    }
}

/// Cheaply cloneable handle to a live graph.
///
/// Equality and hashing are by identity, not contents: two handles are equal
/// iff they point at the same underlying graph.
#[derive(Clone)]
pub struct SharedGraph {
    token: GraphToken,
    inner: Arc<RwLock<Graph>>,
}

impl SharedGraph {
    pub(crate) fn new(graph: Graph) -> Self {
        Self {
            token: GraphToken(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed)),
            inner: Arc::new(RwLock::new(graph)),
        }
    }

    pub fn token(&self) -> GraphToken {
        self.token
    }

    /// Read access to the graph. The guard blocks the calculator's next
    /// mutation, so hold it only as long as needed.
    pub async fn read(&self) -> RwLockReadGuard<'_, Graph> {
        self.inner.read().await
    }

    pub(crate) fn inner(&self) -> &Arc<RwLock<Graph>> {
        &self.inner
    }
}

impl PartialEq for SharedGraph {
    fn eq(&self, other: &Self) -> bool {
        self.token == other.token
    }
}

impl Eq for SharedGraph {}

impl std::hash::Hash for SharedGraph {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.token.hash(state);
    }
}

impl fmt::Debug for SharedGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedGraph")
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}
