//! Traversal error taxonomy.

use std::path::PathBuf;
use std::sync::Arc;

/// A failure while computing a delta. Cloneable so a result can be shared
/// with every caller that piggybacked on one in-flight computation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TraversalError {
    /// The resolver could not map a specifier to a file. Carries the chain of
    /// modules from the entry point down to the module whose import failed.
    #[error("cannot resolve \"{specifier}\" from {}: {cause}", from.display())]
    Resolve {
        specifier: String,
        from: PathBuf,
        import_stack: Vec<PathBuf>,
        cause: Arc<anyhow::Error>,
    },

    /// The transformer failed on a file.
    #[error("cannot transform {}: {cause}", path.display())]
    Transform {
        path: PathBuf,
        import_stack: Vec<PathBuf>,
        cause: Arc<anyhow::Error>,
    },

    /// Two dependencies of one module produced the same key.
    #[error("duplicate dependency key \"{key}\" in {}", path.display())]
    DuplicateDependencyKey { key: String, path: PathBuf },

    /// A `require.context` dependency was found but contexts are disabled.
    #[error("require.context in {} but require.context support is disabled", path.display())]
    ContextNotAllowed { path: PathBuf },

    /// A context filter is not a valid regular expression.
    #[error("invalid require.context filter {pattern:?} in {}: {cause}", path.display())]
    InvalidContextFilter {
        pattern: String,
        path: PathBuf,
        cause: Arc<regex::Error>,
    },

    /// A module that should be in the graph is missing; indicates a traversal
    /// invariant was broken upstream.
    #[error("module not registered in graph: {}", path.display())]
    MissingModule { path: PathBuf },
}

impl TraversalError {
    /// Chain of module paths from the entry point toward the failure, when
    /// the failure occurred on a dependency edge. Empty for structural
    /// errors.
    pub fn import_stack(&self) -> &[PathBuf] {
        match self {
            Self::Resolve { import_stack, .. } | Self::Transform { import_stack, .. } => {
                import_stack
            }
            _ => &[],
        }
    }
}
