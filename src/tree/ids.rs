use crate::models::IndexNode;
use crate::util::slugify;
use std::collections::HashSet;

/// Rewrite colliding ids so every id in the tree is unique.
///
/// Walks in pre-order; the first node to claim an id keeps it. A later node with the same
/// id becomes `{parent}-{slug(title)}-{position}` (no parent prefix at root), with a numeric
/// suffix appended while that is still taken. Child `parent_id` hints are refreshed from the
/// traversal; root hints are left as stored.
pub fn ensure_unique_ids(tree: &[IndexNode]) -> Vec<IndexNode> {
    let mut seen = HashSet::new();
    rewrite(tree, None, &mut seen)
}

fn rewrite(items: &[IndexNode], parent_id: Option<&str>, seen: &mut HashSet<String>) -> Vec<IndexNode> {
    items
        .iter()
        .enumerate()
        .map(|(position, item)| {
            let mut id = item.id.clone();
            if seen.contains(&id) {
                id = collision_id(parent_id, &item.title, position, seen);
            }
            seen.insert(id.clone());

            let mut node = item.clone();
            if parent_id.is_some() {
                node.parent_id = parent_id.map(str::to_string);
            }
            if let Some(children) = item.children.as_deref() {
                node.children = Some(rewrite(children, Some(&id), seen));
            }
            node.id = id;
            node
        })
        .collect()
}

fn collision_id(
    parent_id: Option<&str>,
    title: &str,
    position: usize,
    seen: &HashSet<String>,
) -> String {
    let base = match parent_id {
        Some(p) if !p.is_empty() => format!("{p}-{}-{position}", slugify(title)),
        _ => format!("{}-{position}", slugify(title)),
    };

    if !seen.contains(&base) {
        return base;
    }

    let mut n = 2usize;
    loop {
        let candidate = format!("{base}-{n}");
        if !seen.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
