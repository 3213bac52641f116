//! # quill-graph
//!
//! Incremental module dependency graph model and traversal.
//!
//! This crate is the data-model half of the quill incremental build core. It
//! owns the mutable [`Graph`] of resolved modules, the [`Delta`] record that
//! describes how a graph changed between two builds, and the traversal
//! engine that keeps a graph consistent as files are added, edited, and
//! deleted.
//!
//! It performs no I/O of its own: reading and parsing files is delegated to
//! a [`Transformer`], and mapping import specifiers to absolute paths to a
//! [`Resolver`]. Both are injected per traversal.
//!
//! ## Incremental model
//!
//! A full build calls [`initial_traverse_dependencies`] once, which walks
//! every entry point and returns a `reset` delta containing the whole module
//! set. Subsequent builds call [`traverse_dependencies`] with just the paths
//! that changed; only those modules (and whatever becomes reachable or
//! unreachable through them) are re-transformed. Modules that lose their
//! last importer are pruned, including unreachable import cycles, which are
//! detected with a trial-deletion cycle collector.
//!
//! ## Determinism
//!
//! Traversal visits each module's dependencies in declaration order and the
//! module map is re-ordered after the initial build, so two fresh builds of
//! the same tree produce identical iteration order. That ordering is what
//! makes serialized bundles and source maps reproducible.

pub mod context;
pub mod counting_set;
pub mod error;
pub mod graph;
pub mod module;
pub mod traversal;

pub use context::{
    ContextFilter, ContextMode, RequireContext, RequireContextParams,
    derive_absolute_path_from_context, file_matches_context,
};
pub use counting_set::CountingSet;
pub use error::TraversalError;
pub use graph::{Delta, Dependencies, Graph, ModuleType, TransformOptions};
pub use module::{
    AsyncType, Dependency, DependencyData, GetSource, Module, ModuleOutput, SourceLocation,
    SourcePosition, TransformResult, TransformResultDependency,
};
pub use traversal::{
    ProgressFn, Resolution, Resolver, TraversalOptions, Transformer,
    initial_traverse_dependencies, mark_modified_context_modules, reorder_graph,
    traverse_dependencies,
};

#[cfg(test)]
mod tests;
