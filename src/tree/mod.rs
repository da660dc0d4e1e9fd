//! Pure traversal and copy-on-write transforms over the presentation index.
//!
//! Every transform takes the current tree by reference and returns a new `Vec<IndexNode>`.
//! Unknown ids and out-of-range positions never fail; they return an unchanged copy.

mod backup;
mod ids;
mod relocate;

pub use backup::{export_backup, import_backup, BackupError};
pub use ids::ensure_unique_ids;
pub use relocate::{
    compute_drop_target, invalid_target_ids, move_item, normalize_selection, relocate,
};

use crate::models::IndexNode;

pub fn find_node<'a>(tree: &'a [IndexNode], id: &str) -> Option<&'a IndexNode> {
    for node in tree {
        if node.id == id {
            return Some(node);
        }
        if let Some(found) = find_node(node.children(), id) {
            return Some(found);
        }
    }
    None
}

/// Locate a node together with the container that owns it (`None` at root level).
pub fn find_node_with_parent<'a>(
    tree: &'a [IndexNode],
    id: &str,
) -> Option<(&'a IndexNode, Option<&'a IndexNode>)> {
    fn walk<'a>(
        items: &'a [IndexNode],
        id: &str,
        parent: Option<&'a IndexNode>,
    ) -> Option<(&'a IndexNode, Option<&'a IndexNode>)> {
        for node in items {
            if node.id == id {
                return Some((node, parent));
            }
            if let Some(found) = walk(node.children(), id, Some(node)) {
                return Some(found);
            }
        }
        None
    }

    walk(tree, id, None)
}

/// Nodes from the root down to `id`, inclusive. Also used for breadcrumbs.
pub fn find_path<'a>(tree: &'a [IndexNode], id: &str) -> Option<Vec<&'a IndexNode>> {
    for node in tree {
        if node.id == id {
            return Some(vec![node]);
        }
        if let Some(mut rest) = find_path(node.children(), id) {
            rest.insert(0, node);
            return Some(rest);
        }
    }
    None
}

/// Depth-first pre-order. This is the canonical order for navigation and selections.
pub fn flatten(tree: &[IndexNode]) -> Vec<&IndexNode> {
    fn walk<'a>(items: &'a [IndexNode], out: &mut Vec<&'a IndexNode>) {
        for node in items {
            out.push(node);
            walk(node.children(), out);
        }
    }

    let mut out = Vec::new();
    walk(tree, &mut out);
    out
}

pub(crate) fn flatten_ids(tree: &[IndexNode]) -> Vec<String> {
    flatten(tree).into_iter().map(|n| n.id.clone()).collect()
}

/// Previous and next node ids around `id` in flatten order.
pub fn neighbors(tree: &[IndexNode], id: &str) -> (Option<String>, Option<String>) {
    let flat = flatten(tree);
    let Some(pos) = flat.iter().position(|n| n.id == id) else {
        return (None, None);
    };

    let prev = pos.checked_sub(1).map(|i| flat[i].id.clone());
    let next = flat.get(pos + 1).map(|n| n.id.clone());
    (prev, next)
}

/// Leaves under a node; a node without children counts as one.
pub fn count_leaves(node: &IndexNode) -> usize {
    if !node.has_children() {
        return 1;
    }
    node.children().iter().map(count_leaves).sum()
}

/// Total sub-slide entries across every `content` array in the tree.
pub fn total_sub_slides(tree: &[IndexNode]) -> usize {
    flatten(tree).iter().map(|n| n.sub_slide_count()).sum()
}

/// Drop every `content` field, keeping only structure.
pub fn strip_content(tree: &[IndexNode]) -> Vec<IndexNode> {
    tree.iter()
        .map(|node| IndexNode {
            id: node.id.clone(),
            title: node.title.clone(),
            parent_id: node.parent_id.clone(),
            children: node.children.as_deref().map(strip_content),
            content: None,
        })
        .collect()
}

/// Replace one node's content.
pub fn set_content(tree: &[IndexNode], id: &str, content: Option<Vec<String>>) -> Vec<IndexNode> {
    let mut next = tree.to_vec();
    if let Some(node) = find_node_mut(&mut next, id) {
        node.content = content;
    }
    next
}

/// Case-insensitive title search.
///
/// Keeps every ancestor of a match. A matching node whose descendants do not match keeps
/// its existing children so the whole topic stays browsable.
pub fn filter_by_title(tree: &[IndexNode], query: &str) -> Vec<IndexNode> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return tree.to_vec();
    }

    fn walk(items: &[IndexNode], query: &str) -> Vec<IndexNode> {
        let mut out = Vec::new();
        for node in items {
            let matched = node.title.to_lowercase().contains(query);
            let kept = walk(node.children(), query);

            if matched || !kept.is_empty() {
                let mut copy = node.clone();
                copy.children = if !kept.is_empty() {
                    Some(kept)
                } else {
                    node.children.clone()
                };
                out.push(copy);
            }
        }
        out
    }

    walk(tree, &query)
}

pub(crate) fn find_node_mut<'a>(tree: &'a mut [IndexNode], id: &str) -> Option<&'a mut IndexNode> {
    for node in tree.iter_mut() {
        if node.id == id {
            return Some(node);
        }
        if let Some(children) = node.children.as_mut() {
            if let Some(found) = find_node_mut(children, id) {
                return Some(found);
            }
        }
    }
    None
}
