//! Canonical graph identity.
//!
//! Concurrent requests for "the same bundle" must converge on one build, so
//! every option that affects transform or resolution output is folded into a
//! deterministic id. Map-valued options are recursively key-sorted and
//! absent optional fields normalize to `null`, making the id independent of
//! key order and of explicitly-passed defaults.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use quill_graph::TransformOptions;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque identity of a logical bundle: entry file plus every
/// output-affecting option. Stable across updates to the same bundle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphId(String);

impl GraphId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Options that feed the resolver collaborator. Only free-form custom
/// options live here; platform is part of [`TransformOptions`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolverOptions {
    pub custom: BTreeMap<String, Value>,
}

impl ResolverOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_custom(mut self, key: impl Into<String>, value: Value) -> Self {
        self.custom.insert(key.into(), value);
        self
    }
}

/// Traversal flags that change a graph's shape and therefore its identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphFlags {
    pub shallow: bool,
    pub lazy: bool,
    pub allow_require_context: bool,
}

/// Compute the canonical id for a bundle request.
pub fn get_graph_id(
    entry_files: &[PathBuf],
    transform_options: &TransformOptions,
    resolver_options: &ResolverOptions,
    flags: &GraphFlags,
) -> GraphId {
    let params = serde_json::json!({
        "entryFiles": entry_files
            .iter()
            .map(|path| path.to_string_lossy())
            .collect::<Vec<_>>(),
        "transform": transform_options,
        "resolver": resolver_options,
        "flags": flags,
    });
    let canonical = canonicalize(params);
    let serialized =
        serde_json::to_string(&canonical).expect("canonical graph-id params always serialize");
    GraphId(blake3::hash(serialized.as_bytes()).to_hex().to_string())
}

/// Recursively key-sort every object so serialization is order-independent
/// no matter how the value was constructed.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .into_iter()
                .map(|(key, value)| (key, canonicalize(value)))
                .collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
