use super::{find_node, find_node_mut, find_node_with_parent, find_path, flatten};
use crate::models::IndexNode;
use std::collections::HashSet;

/// Every moved id plus all of their descendants. None of these may become a destination.
pub fn invalid_target_ids(tree: &[IndexNode], moved_ids: &[String]) -> HashSet<String> {
    fn visit(items: &[IndexNode], out: &mut HashSet<String>) {
        for node in items {
            out.insert(node.id.clone());
            visit(node.children(), out);
        }
    }

    let mut out = HashSet::new();
    for id in moved_ids {
        let Some(node) = find_node(tree, id) else {
            continue;
        };
        out.insert(node.id.clone());
        visit(node.children(), &mut out);
    }
    out
}

/// Drop unknown ids and ids that already travel with a selected ancestor, then sort the
/// survivors in flatten order.
pub fn normalize_selection(tree: &[IndexNode], selected: &HashSet<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    flatten(tree)
        .into_iter()
        .filter(|node| selected.contains(&node.id))
        .filter(|node| {
            find_path(tree, &node.id).is_some_and(|path| {
                path[..path.len() - 1]
                    .iter()
                    .all(|ancestor| !selected.contains(&ancestor.id))
            })
        })
        .filter(|node| seen.insert(node.id.clone()))
        .map(|node| node.id.clone())
        .collect()
}

/// Move `moved_ids` (in the given order) under `dest_parent_id` (root when `None`) at
/// `dest_index`, measured in the destination array after the moved nodes were taken out.
///
/// Returns an unchanged copy when the destination is unknown, is one of the moved nodes or
/// lies inside one, or when none of the moved ids exist.
pub fn relocate(
    tree: &[IndexNode],
    moved_ids: &[String],
    dest_parent_id: Option<&str>,
    dest_index: usize,
) -> Vec<IndexNode> {
    if moved_ids.is_empty() {
        return tree.to_vec();
    }

    if let Some(dest) = dest_parent_id {
        if find_node(tree, dest).is_none() || invalid_target_ids(tree, moved_ids).contains(dest) {
            return tree.to_vec();
        }
    }

    let mut next = tree.to_vec();
    let mut seen = HashSet::new();
    let mut removed = Vec::with_capacity(moved_ids.len());
    for id in moved_ids {
        if !seen.insert(id.as_str()) {
            continue;
        }
        if let Some(node) = take_node(&mut next, id) {
            removed.push(node);
        }
    }

    if removed.is_empty() {
        return tree.to_vec();
    }

    for node in removed.iter_mut() {
        node.parent_id = dest_parent_id.map(str::to_string);
    }

    let dest_items = match dest_parent_id {
        None => &mut next,
        Some(dest) => match find_node_mut(&mut next, dest) {
            Some(parent) => parent.children.get_or_insert_with(Vec::new),
            None => return tree.to_vec(),
        },
    };

    let at = dest_index.min(dest_items.len());
    dest_items.splice(at..at, removed);
    next
}

/// Translate "drop before/after `target_id`" into a `relocate` destination.
///
/// `None` when the target is one of the moved nodes (or inside one), when the target is
/// unknown, or when the move would leave the tree as it is.
pub fn compute_drop_target(
    tree: &[IndexNode],
    moved_ids: &[String],
    target_id: &str,
    insert_after: bool,
) -> Option<(Option<String>, usize)> {
    if moved_ids.is_empty() || invalid_target_ids(tree, moved_ids).contains(target_id) {
        return None;
    }

    let (_, parent) = find_node_with_parent(tree, target_id)?;
    let siblings = match parent {
        Some(p) => p.children(),
        None => tree,
    };

    let tidx = siblings
        .iter()
        .filter(|n| !moved_ids.contains(&n.id))
        .position(|n| n.id == target_id)?;
    let dest_index = if insert_after { tidx + 1 } else { tidx };
    let dest_parent = parent.map(|p| p.id.clone());

    let next = relocate(tree, moved_ids, dest_parent.as_deref(), dest_index);
    if same_structure(&next, tree) {
        return None;
    }

    Some((dest_parent, dest_index))
}

/// Drag-and-drop reorder: put `drag_id` right before `drop_id`, in the drop node's container.
pub fn move_item(tree: &[IndexNode], drag_id: &str, drop_id: &str) -> Vec<IndexNode> {
    let moved = vec![drag_id.to_string()];
    match compute_drop_target(tree, &moved, drop_id, false) {
        Some((parent, index)) => relocate(tree, &moved, parent.as_deref(), index),
        None => tree.to_vec(),
    }
}

fn take_node(items: &mut Vec<IndexNode>, id: &str) -> Option<IndexNode> {
    if let Some(pos) = items.iter().position(|n| n.id == id) {
        return Some(items.remove(pos));
    }
    for node in items.iter_mut() {
        if let Some(children) = node.children.as_mut() {
            if let Some(found) = take_node(children, id) {
                return Some(found);
            }
        }
    }
    None
}

fn same_structure(a: &[IndexNode], b: &[IndexNode]) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b)
            .all(|(x, y)| x.id == y.id && same_structure(x.children(), y.children()))
}
