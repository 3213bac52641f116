//! Property-based tests for the traversal engine.
//!
//! Run with: cargo test --features proptest --package quill-graph

#![cfg(feature = "proptest")]

use std::collections::HashSet;

use proptest::prelude::*;

use super::{TestFs, assert_graph_invariants, p};
use crate::counting_set::CountingSet;
use crate::graph::{Graph, TransformOptions};
use crate::traversal::{initial_traverse_dependencies, traverse_dependencies};

/// Dependency lists for a small file tree: file `i` depends on the files at
/// the returned indices. Unique per file, so dependency keys never collide.
fn file_specs() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (2usize..6).prop_flat_map(|count| {
        proptest::collection::vec(
            proptest::collection::hash_set(0..count, 0..count).prop_map(|deps| {
                let mut deps: Vec<usize> = deps.into_iter().collect();
                deps.sort_unstable();
                deps
            }),
            count,
        )
    })
}

fn install(fs: &TestFs, specs: &[Vec<usize>]) {
    for (index, deps) in specs.iter().enumerate() {
        let names: Vec<String> = deps.iter().map(|dep| format!("f{dep}")).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        fs.set(&format!("/f{index}.js"), &names);
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("tokio runtime")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Counting-set semantics match a reference count map under arbitrary
    /// interleavings of add and remove.
    #[test]
    fn prop_counting_set_matches_reference_counts(
        ops in proptest::collection::vec((0u8..4, any::<bool>()), 0..64)
    ) {
        let mut set = CountingSet::new();
        let mut reference: std::collections::HashMap<u8, usize> = std::collections::HashMap::new();

        for (item, is_add) in ops {
            if is_add {
                set.add(item);
                *reference.entry(item).or_insert(0) += 1;
            } else {
                set.remove(&item);
                if let Some(count) = reference.get_mut(&item) {
                    *count -= 1;
                    if *count == 0 {
                        reference.remove(&item);
                    }
                }
            }
        }

        prop_assert_eq!(set.len(), reference.len());
        for (item, count) in &reference {
            prop_assert_eq!(set.count(item), *count);
        }
    }

    /// A fresh build of any file tree satisfies the graph invariants and is
    /// deterministic: building twice yields the same module order.
    #[test]
    fn prop_initial_build_is_consistent_and_deterministic(specs in file_specs()) {
        let rt = runtime();
        rt.block_on(async {
            let fs = TestFs::new();
            install(&fs, &specs);

            let mut first = Graph::new([p("/f0.js")], TransformOptions::default());
            initial_traverse_dependencies(&mut first, &fs.options())
                .await
                .expect("initial build");
            assert_graph_invariants(&first, false);

            let mut second = Graph::new([p("/f0.js")], TransformOptions::default());
            initial_traverse_dependencies(&mut second, &fs.options())
                .await
                .expect("second build");

            let first_order: Vec<_> = first.dependencies.keys().cloned().collect();
            let second_order: Vec<_> = second.dependencies.keys().cloned().collect();
            assert_eq!(first_order, second_order);
        });
    }

    /// After an arbitrary edit to one file, the incremental delta is
    /// internally consistent and the graph invariants still hold.
    #[test]
    fn prop_incremental_update_preserves_invariants(
        specs in file_specs(),
        target in 0usize..6,
        new_deps in proptest::collection::hash_set(0usize..6, 0..6)
    ) {
        let rt = runtime();
        rt.block_on(async {
            let fs = TestFs::new();
            install(&fs, &specs);

            let mut graph = Graph::new([p("/f0.js")], TransformOptions::default());
            initial_traverse_dependencies(&mut graph, &fs.options())
                .await
                .expect("initial build");

            let count = specs.len();
            let target = target % count;
            let new_deps: HashSet<usize> = new_deps.into_iter().map(|dep| dep % count).collect();
            let mut new_deps: Vec<usize> = new_deps.into_iter().collect();
            new_deps.sort_unstable();

            let names: Vec<String> = new_deps.iter().map(|dep| format!("f{dep}")).collect();
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            let target_path = format!("/f{target}.js");
            fs.set(&target_path, &names);

            let delta = traverse_dependencies(&[p(&target_path)], &mut graph, &fs.options())
                .await
                .expect("incremental build");

            assert_graph_invariants(&graph, false);

            // A path appears in at most one of added/modified/deleted.
            for path in delta.added.keys() {
                assert!(!delta.modified.contains_key(path));
                assert!(!delta.deleted.contains(path));
            }
            for path in delta.modified.keys() {
                assert!(!delta.deleted.contains(path));
            }

            // Idempotence: nothing changed since, so the next delta is empty.
            let empty = traverse_dependencies(&[], &mut graph, &fs.options())
                .await
                .expect("noop build");
            assert!(empty.is_empty());
        });
    }
}
