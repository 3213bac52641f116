//! Error taxonomy for the bundler layer.
//!
//! Callers need to tell recoverable "your session is gone" conditions apart
//! from real failures: a graph or revision that cannot be found means the
//! client should fall back to a full rebuild, while a delta failure carries
//! the actual diagnostic. Every variant is cloneable so results can be
//! shared between callers converging on one in-flight build.

use std::path::PathBuf;

use quill_graph::TraversalError;

use crate::incremental::RevisionId;

/// Error type for quill-bundler operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// A graph was requested that has no live calculator or revision: it was
    /// never built, or it has been ended. Recoverable by rebuilding from
    /// scratch.
    #[error("graph not found: {0}")]
    GraphNotFound(String),

    /// A revision id has no matching entry: it expired, was replaced by a
    /// newer revision, or the server restarted. Recoverable by falling back
    /// to a rebuild via the graph id.
    #[error("revision not found: {0}")]
    RevisionNotFound(RevisionId),

    /// An entry file does not exist on disk at graph-build time.
    #[error("resource not found: {}", .0.display())]
    ResourceNotFound(PathBuf),

    /// Delta computation failed.
    #[error(transparent)]
    Delta(#[from] DeltaError),
}

impl From<TraversalError> for Error {
    fn from(error: TraversalError) -> Self {
        Self::Delta(DeltaError::Traversal(error))
    }
}

/// Result type alias for quill-bundler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A failure while computing a delta on one calculator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DeltaError {
    #[error(transparent)]
    Traversal(#[from] TraversalError),

    /// The calculator has been ended; no further deltas can be computed.
    #[error("delta calculator has ended")]
    Ended,

    /// The task driving the in-flight computation went away before
    /// completing it.
    #[error("delta computation was interrupted")]
    Interrupted,
}
