//! Sub-slide moves and clipboard pastes across leaf `content` arrays.

mod clipboard;

pub use clipboard::{decode_sub_slide_drag, encode_sub_slide_drag, SubSlideClipboard, SubSlideSelection};

use crate::models::{IndexNode, PasteMode, SubSlideRef};
use crate::tree::{find_node, find_node_mut};
use std::collections::BTreeMap;

/// Move one sub-slide, within a node or between two nodes.
///
/// Within one node `dest_index` is read in pre-removal coordinates, so a target past the
/// source shifts down by one. Landing on the current position, an unknown node, or an
/// out-of-range source leaves the tree unchanged.
pub fn move_sub_slide(
    tree: &[IndexNode],
    source_parent_id: &str,
    source_index: usize,
    dest_parent_id: &str,
    dest_index: usize,
) -> Vec<IndexNode> {
    let Some(source) = find_node(tree, source_parent_id) else {
        return tree.to_vec();
    };
    if source_index >= source.sub_slide_count() || find_node(tree, dest_parent_id).is_none() {
        return tree.to_vec();
    }

    let mut next = tree.to_vec();

    if source_parent_id == dest_parent_id {
        let Some(content) = find_node_mut(&mut next, source_parent_id).and_then(|n| n.content.as_mut())
        else {
            return tree.to_vec();
        };

        let mut target = dest_index;
        if target > source_index {
            target -= 1;
        }
        let html = content.remove(source_index);
        let target = target.min(content.len());
        if target == source_index {
            return tree.to_vec();
        }
        content.insert(target, html);
        return next;
    }

    let html = match find_node_mut(&mut next, source_parent_id).and_then(|n| n.content.as_mut()) {
        Some(content) => content.remove(source_index),
        None => return tree.to_vec(),
    };

    let Some(dest) = find_node_mut(&mut next, dest_parent_id) else {
        return tree.to_vec();
    };
    let content = dest.content.get_or_insert_with(Vec::new);
    let at = dest_index.min(content.len());
    content.insert(at, html);
    next
}

/// Paste captured sub-slides at `dest_index` of `dest_parent_id`.
///
/// `htmls` must have been read before this call. For [`PasteMode::Cut`] the sources are
/// removed first (per node, highest index first) and the destination index is shifted down
/// by the number of removed entries of the destination node that sat before it.
pub fn paste_sub_slides(
    tree: &[IndexNode],
    mode: PasteMode,
    sources: &[SubSlideRef],
    dest_parent_id: &str,
    dest_index: usize,
    htmls: &[String],
) -> Vec<IndexNode> {
    if htmls.is_empty() || find_node(tree, dest_parent_id).is_none() {
        return tree.to_vec();
    }

    let mut next = tree.to_vec();
    let mut target = dest_index;

    if mode == PasteMode::Cut {
        let mut by_parent: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for source in sources {
            by_parent
                .entry(source.parent_id.as_str())
                .or_default()
                .push(source.index);
        }

        for (parent_id, mut indices) in by_parent {
            let Some(content) = find_node_mut(&mut next, parent_id).and_then(|n| n.content.as_mut())
            else {
                continue;
            };

            indices.sort_unstable_by(|a, b| b.cmp(a));
            indices.dedup();

            let mut removed_before_target = 0;
            for index in indices {
                if index >= content.len() {
                    continue;
                }
                content.remove(index);
                if index < dest_index {
                    removed_before_target += 1;
                }
            }

            if parent_id == dest_parent_id {
                target -= removed_before_target;
            }
        }
    }

    let Some(dest) = find_node_mut(&mut next, dest_parent_id) else {
        return tree.to_vec();
    };
    let content = dest.content.get_or_insert_with(Vec::new);
    let at = target.min(content.len());
    content.splice(at..at, htmls.iter().cloned());
    next
}
