//! Stable numeric module ids.
//!
//! Serializers address modules by number, not path. Ids must be stable per
//! path for the lifetime of the factory so that incremental updates never
//! renumber unrelated modules; the graph engine guarantees path stability,
//! this factory turns that into id stability.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

pub struct ModuleIdFactory {
    state: Mutex<IdState>,
}

struct IdState {
    next: usize,
    ids: FxHashMap<PathBuf, usize>,
}

impl ModuleIdFactory {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(IdState {
                next: 0,
                ids: FxHashMap::default(),
            }),
        }
    }

    /// The id for `path`, assigning the next dense id on first sight.
    pub fn id_for(&self, path: &Path) -> usize {
        let mut state = self.state.lock();
        if let Some(id) = state.ids.get(path) {
            return *id;
        }
        let id = state.next;
        state.next += 1;
        state.ids.insert(path.to_path_buf(), id);
        id
    }
}

impl Default for ModuleIdFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_stable_per_path() {
        let factory = ModuleIdFactory::new();
        let first = factory.id_for(Path::new("/a.js"));
        factory.id_for(Path::new("/b.js"));
        assert_eq!(factory.id_for(Path::new("/a.js")), first);
    }

    #[test]
    fn ids_are_dense_in_first_seen_order() {
        let factory = ModuleIdFactory::new();
        assert_eq!(factory.id_for(Path::new("/a.js")), 0);
        assert_eq!(factory.id_for(Path::new("/b.js")), 1);
        assert_eq!(factory.id_for(Path::new("/c.js")), 2);
    }
}
