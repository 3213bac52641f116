//! # quill-bundler
//!
//! Incremental build orchestration on top of the `quill-graph` foundation.
//!
//! This crate turns the single-graph traversal engine into a long-running
//! incremental build service:
//!
//! - [`DeltaCalculator`] owns one graph, accumulates file-change
//!   notifications, and computes coalesced deltas on demand.
//! - [`DeltaBundler`] is the registry of live graphs. It fans the upstream
//!   watcher event stream out to every calculator and routes delta, listen,
//!   and teardown requests by graph handle.
//! - [`IncrementalBundler`] adds identity and snapshotting: every
//!   successful build or update yields an immutable [`Revision`] addressable
//!   by a fresh random [`RevisionId`] and by the canonical [`GraphId`]
//!   derived from entry file and options, so concurrent requests for the
//!   same bundle converge on one build.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use quill_bundler::{GraphOptions, IncrementalBundler, ResolverOptions, TransformOptions};
//! # fn collaborators() -> (Arc<dyn quill_bundler::Resolver>, Arc<dyn quill_bundler::Transformer>) { unimplemented!() }
//!
//! # async fn example() -> quill_bundler::Result<()> {
//! let (resolver, transformer) = collaborators();
//! let bundler = IncrementalBundler::new("/project");
//!
//! let (revision, delta) = bundler
//!     .initialize_graph(
//!         Path::new("src/index.js"),
//!         TransformOptions::new().with_dev(true),
//!         &ResolverOptions::default(),
//!         GraphOptions::new(resolver, transformer),
//!     )
//!     .await?;
//! assert!(delta.reset);
//!
//! // Later, after file-change notifications arrived:
//! let (revision, delta) = bundler.update_graph(&revision, false).await?;
//! # let _ = (revision, delta);
//! # Ok(()) }
//! ```
//!
//! The file watcher, transformer, and resolver are collaborators injected by
//! the embedder; this crate never touches source files itself beyond an
//! existence check on entry points.

// Re-export everything from the foundation crate
pub use quill_graph::*;

pub mod calculator;
pub mod delta_bundler;
pub mod error;
pub mod graph_id;
pub mod incremental;
pub mod module_ids;
pub mod shared_graph;
pub mod watcher;

mod promise;

pub use calculator::{DeltaCalculator, DeltaOptions, GraphOptions};
pub use delta_bundler::DeltaBundler;
pub use error::{DeltaError, Error, Result};
pub use graph_id::{GraphFlags, GraphId, ResolverOptions, get_graph_id};
pub use incremental::{IncrementalBundler, Revision, RevisionId};
pub use module_ids::ModuleIdFactory;
pub use shared_graph::{GraphToken, SharedGraph};
pub use watcher::{ChangeEvent, WatchEvent, WatchEventKind};

// Logging utilities (optional, enabled with "logging" feature)
#[cfg(feature = "logging")]
pub mod logging;

#[cfg(feature = "logging")]
pub use logging::{init_logging, init_logging_from_env};
