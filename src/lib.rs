//! Hierarchical slide index with write-behind persistence of slide content.
//!
//! - [`tree`]: pure copy-on-write operations on the outline.
//! - [`slides`]: sub-slide moves, cut/copy/paste and selection.
//! - [`sync`]: debounced, coalesced, retried writes plus a cached content listing.
//! - [`reconcile`]: merging the stored shape with remote content on load.
//! - [`state`]: the reactive controller the UI talks to.

pub mod api;
pub mod cache;
pub mod config;
pub mod defaults;
pub mod models;
pub mod reconcile;
pub mod slides;
pub mod state;
pub mod storage;
pub mod sync;
pub mod tree;
mod util;

pub use api::{ApiClient, RemoteStore, StoreError, StoreErrorKind, StoreResult};
pub use config::SyncConfig;
pub use models::{ContentRecord, IndexNode, PasteMode, PersistedTreeShape, SubSlideRef};
pub use reconcile::{reconcile, ReconcileOptions, ReconcileOutcome};
pub use state::{BrowserOutline, OutlineController};
pub use storage::{LocalShapeStore, MemoryShapeStore, ShapeStore};
pub use sync::WriteBehindCache;


#[cfg(test)]
mod tests {
    use super::*;
    use crate::slides::{move_sub_slide, paste_sub_slides};
    use crate::tree::fixtures::{html, sample};
    use crate::tree::{
        ensure_unique_ids, find_node, flatten, flatten_ids, invalid_target_ids,
        normalize_selection, relocate, total_sub_slides,
    };
    use std::collections::HashSet;

    fn all_subsets(ids: &[String]) -> Vec<HashSet<String>> {
        (0..(1u32 << ids.len()))
            .map(|mask| {
                ids.iter()
                    .enumerate()
                    .filter(|(i, _)| mask & (1 << i) != 0)
                    .map(|(_, id)| id.clone())
                    .collect()
            })
            .collect()
    }

    fn has_duplicates(tree: &[IndexNode]) -> bool {
        let ids = flatten_ids(tree);
        ids.iter().collect::<HashSet<_>>().len() != ids.len()
    }

    #[test]
    fn test_selection_normalization_is_idempotent() {
        let tree = sample();
        for selected in all_subsets(&flatten_ids(&tree)) {
            let once = normalize_selection(&tree, &selected);
            let twice = normalize_selection(&tree, &once.iter().cloned().collect());
            assert_eq!(once, twice, "selection {selected:?}");
        }
    }

    #[test]
    fn test_relocate_conserves_nodes_for_every_valid_target() {
        let tree = sample();
        let ids = flatten_ids(&tree);
        let mut targets: Vec<Option<&str>> = vec![None];
        targets.extend(ids.iter().map(|s| Some(s.as_str())));

        for moved in ids.iter() {
            let moved = vec![moved.clone()];
            let invalid = invalid_target_ids(&tree, &moved);
            for target in &targets {
                for index in 0..4 {
                    let next = relocate(&tree, &moved, *target, index);
                    assert_eq!(flatten(&next).len(), flatten(&tree).len());
                    assert!(!has_duplicates(&next));

                    let before = find_node(&tree, &moved[0]).expect("moved exists");
                    let after = find_node(&next, &moved[0]).expect("moved survives");
                    assert_eq!(flatten_ids(before.children()), flatten_ids(after.children()));

                    if target.is_some_and(|t| invalid.contains(t)) {
                        assert_eq!(next, tree);
                    }
                }
            }
        }
    }

    #[test]
    fn test_sub_slide_moves_conserve_entries() {
        let tree = sample();
        let parents = ["a1", "a2x", "b", "c", "missing"];
        for src in parents {
            for dst in parents {
                for si in 0..4 {
                    for di in 0..5 {
                        let next = move_sub_slide(&tree, src, si, dst, di);
                        assert_eq!(total_sub_slides(&next), total_sub_slides(&tree));
                    }
                }
            }
        }
    }

    #[test]
    fn test_cut_conserves_and_copy_adds() {
        let tree = sample();
        let sources = vec![SubSlideRef::new("b", 0), SubSlideRef::new("b", 2)];
        let htmls = vec![html("b-0"), html("b-2")];

        for dest in ["a1", "b", "c"] {
            for idx in 0..4 {
                let cut = paste_sub_slides(&tree, PasteMode::Cut, &sources, dest, idx, &htmls);
                assert_eq!(total_sub_slides(&cut), total_sub_slides(&tree));

                let copy = paste_sub_slides(&tree, PasteMode::Copy, &sources, dest, idx, &htmls);
                assert_eq!(total_sub_slides(&copy), total_sub_slides(&tree) + htmls.len());
            }
        }
    }

    #[test]
    fn test_unique_ids_after_reconcile_with_colliding_shape() {
        let stored: PersistedTreeShape = serde_json::from_str(
            r#"[
                {"id": "t", "title": "Topic", "children": [{"id": "x", "title": "X"}]},
                {"id": "x", "title": "X again", "children": [{"id": "t", "title": "T"}]}
            ]"#,
        )
        .expect("shape should parse");
        let records = vec![ContentRecord::new("x", Some(vec![html("x")]))];
        let options = ReconcileOptions {
            merge_default_topics: false,
            now_ms: 0,
        };
        let out = reconcile(Some(&stored), &records, &[], options);
        assert!(!has_duplicates(&out.tree));
        assert_eq!(ensure_unique_ids(&out.tree), out.tree);
    }
}
