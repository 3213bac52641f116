//! Shared fixtures for quill-bundler integration tests.
//!
//! `TestProject` backs a real temporary directory (entry-existence checks
//! hit the file system) while resolution and transformation run against an
//! in-memory dependency table, with a counter so tests can assert exactly
//! how much transform work a build performed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use quill_bundler::{
    GraphOptions, ModuleOutput, RequireContext, Resolution, Resolver, TransformResult,
    TransformResultDependency, Transformer,
};
use rustc_hash::FxHashMap;
use tempfile::TempDir;

pub struct TestProject {
    dir: TempDir,
    files: Mutex<FxHashMap<PathBuf, Vec<TransformResultDependency>>>,
    transform_count: AtomicUsize,
    transform_delay: Mutex<Option<Duration>>,
}

impl TestProject {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            dir: TempDir::new().expect("temp dir"),
            files: Mutex::new(FxHashMap::default()),
            transform_count: AtomicUsize::new(0),
            transform_delay: Mutex::new(None),
        })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Create the file on disk and register its imports.
    pub fn write(&self, name: &str, deps: &[&str]) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, format!("// {name}\n")).expect("write file");
        self.set_deps(name, deps);
        path
    }

    /// Update a file's imports without touching disk, as an editor would be
    /// followed by a watcher event.
    pub fn set_deps(&self, name: &str, deps: &[&str]) {
        let path = self.path(name);
        self.files.lock().insert(
            path,
            deps.iter()
                .map(|dep| TransformResultDependency::new(*dep))
                .collect(),
        );
    }

    /// Delete the file from disk and from the dependency table.
    pub fn delete(&self, name: &str) {
        let path = self.path(name);
        let _ = std::fs::remove_file(&path);
        self.files.lock().remove(&path);
    }

    pub fn transform_count(&self) -> usize {
        self.transform_count.load(Ordering::SeqCst)
    }

    /// Slow every transform down, to widen the window for concurrency tests.
    pub fn set_transform_delay(&self, delay: Duration) {
        *self.transform_delay.lock() = Some(delay);
    }

    pub fn options(self: &Arc<Self>) -> GraphOptions {
        GraphOptions::new(self.clone(), self.clone())
    }
}

impl Resolver for TestProject {
    fn resolve(
        &self,
        _from: &Path,
        dependency: &TransformResultDependency,
    ) -> anyhow::Result<Resolution> {
        let target = self.path(&format!("{}.js", dependency.name));
        if self.files.lock().contains_key(&target) {
            Ok(Resolution::SourceFile(target))
        } else {
            anyhow::bail!("cannot resolve \"{}\"", dependency.name)
        }
    }
}

#[async_trait]
impl Transformer for TestProject {
    async fn transform(
        &self,
        path: &Path,
        _context: Option<&RequireContext>,
    ) -> anyhow::Result<TransformResult> {
        let delay = *self.transform_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.transform_count.fetch_add(1, Ordering::SeqCst);
        let deps = self
            .files
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("file not found: {}", path.display()))?;
        Ok(TransformResult::new(
            deps,
            vec![ModuleOutput::new(
                "js/module",
                serde_json::json!({ "code": format!("__d({:?});", path) }),
            )],
        ))
    }
}

/// Module paths of a delta component, for compact assertions.
pub fn keys(map: &quill_bundler::Dependencies) -> Vec<PathBuf> {
    map.keys().cloned().collect()
}
