//! Module and dependency records produced by graph traversal.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::context::RequireContextParams;
use crate::counting_set::CountingSet;

/// Lazily produces the raw bytes of a source file.
///
/// Kept as a shared closure so modules do not hold every file's contents in
/// memory; serializers call it when they actually need the source (hashing,
/// source maps).
pub type GetSource = Arc<dyn Fn() -> std::io::Result<Vec<u8>> + Send + Sync>;

pub(crate) fn default_get_source() -> GetSource {
    Arc::new(|| Ok(Vec::new()))
}

/// Whether a dependency edge is reached through a dynamic import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AsyncType {
    /// `import()` expression.
    Async,
    /// `__prefetchImport()` hint.
    Prefetch,
}

/// A position inside a source file, 1-based line and 0-based column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePosition {
    pub line: u32,
    pub column: u32,
}

/// Span of the import statement that created a dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub start: SourcePosition,
    pub end: SourcePosition,
}

/// Metadata attached to a single dependency edge, as reported by the
/// transformer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyData {
    /// Stable key for this edge within the parent module. Usually the literal
    /// specifier, but synthetic for `require.context` edges.
    pub key: String,
    /// `None` for synchronous imports.
    #[serde(default)]
    pub async_type: Option<AsyncType>,
    /// The import is wrapped in a try/catch; a failed resolution is handled
    /// at runtime instead of failing the build.
    #[serde(default)]
    pub is_optional: bool,
    /// Source spans of the import statements, for diagnostics.
    #[serde(default)]
    pub locs: Vec<SourceLocation>,
    /// Present for `require.context` edges.
    #[serde(default)]
    pub context_params: Option<RequireContextParams>,
    /// Caller-defined bundle-split condition, passed through untouched.
    #[serde(default)]
    pub split_condition: Option<serde_json::Value>,
}

impl DependencyData {
    /// Dependency metadata for a plain synchronous import of `name`.
    pub fn sync(name: &str) -> Self {
        Self {
            key: name.to_string(),
            async_type: None,
            is_optional: false,
            locs: Vec::new(),
            context_params: None,
            split_condition: None,
        }
    }
}

/// A dependency as it appears in a transformer result: the literal request
/// plus its metadata, before resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformResultDependency {
    /// The literal specifier as written in the source.
    pub name: String,
    pub data: DependencyData,
}

impl TransformResultDependency {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let data = DependencyData::sync(&name);
        Self { name, data }
    }
}

/// A resolved dependency edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    pub absolute_path: PathBuf,
    pub data: TransformResultDependency,
}

/// One output artifact of a transformed module, tagged with its kind
/// (`"js/module"`, `"js/script"`, `"bytecode"`, ...). The graph engine never
/// interprets the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleOutput {
    #[serde(rename = "type")]
    pub output_type: String,
    pub data: serde_json::Value,
}

impl ModuleOutput {
    pub fn new(output_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            output_type: output_type.into(),
            data,
        }
    }
}

/// Result of transforming a single file.
#[derive(Clone)]
pub struct TransformResult {
    /// Dependencies in declaration order. Order is load-bearing: it drives
    /// traversal order and therefore serialization order.
    pub dependencies: Vec<TransformResultDependency>,
    pub output: Arc<Vec<ModuleOutput>>,
    pub get_source: GetSource,
}

impl TransformResult {
    pub fn new(dependencies: Vec<TransformResultDependency>, output: Vec<ModuleOutput>) -> Self {
        Self {
            dependencies,
            output: Arc::new(output),
            get_source: default_get_source(),
        }
    }

    pub fn with_source(mut self, get_source: GetSource) -> Self {
        self.get_source = get_source;
        self
    }
}

impl fmt::Debug for TransformResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformResult")
            .field("dependencies", &self.dependencies)
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

/// One resolved, transformed source file in the graph.
#[derive(Clone, Serialize, Deserialize)]
pub struct Module {
    /// Absolute file path; primary key, stable across rebuilds.
    pub path: PathBuf,
    /// Forward edges keyed by dependency key, in declaration order.
    pub dependencies: IndexMap<String, Dependency>,
    /// Paths of modules importing this one, with multiplicity.
    pub inverse_dependencies: CountingSet<PathBuf>,
    pub output: Arc<Vec<ModuleOutput>>,
    #[serde(skip, default = "default_get_source")]
    pub get_source: GetSource,
}

impl Module {
    pub(crate) fn new(path: PathBuf, output: Arc<Vec<ModuleOutput>>, get_source: GetSource) -> Self {
        Self {
            path,
            dependencies: IndexMap::new(),
            inverse_dependencies: CountingSet::new(),
            output,
            get_source,
        }
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("path", &self.path)
            .field("dependencies", &self.dependencies)
            .field("inverse_dependencies", &self.inverse_dependencies)
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}
