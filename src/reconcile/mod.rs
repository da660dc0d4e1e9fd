//! Building the initial in-memory tree from the cached shape and the remote content.
//!
//! The local shape says where things go, the remote records say what they contain. Records
//! that no node claims are not dropped; they are gathered into a recovered folder at the end
//! of the root so the user can file them again.

use crate::api::{RemoteStore, StoreError};
use crate::defaults::merge_default_topics;
use crate::models::{ContentRecord, IndexNode};
use crate::storage::ShapeStore;
use crate::sync::{Alarm, Clock, WriteBehindCache};
use crate::tree::{ensure_unique_ids, find_node, flatten};
use leptos::logging::{error, log};
use std::collections::{HashMap, HashSet};

pub const RECOVERED_FOLDER_PREFIX: &str = "recovered-folder-";
pub const RECOVERED_FOLDER_TITLE: &str = "Recovered from store";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Add default topics missing from a stored shape.
    pub merge_default_topics: bool,
    /// Timestamp used to name the recovered folder.
    pub now_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub tree: Vec<IndexNode>,
    pub recovered_folder_id: Option<String>,
    /// Ids matched through the legacy prefix-stripped scheme, as `(node id, record id)`.
    pub legacy_matches: Vec<(String, String)>,
    pub orphan_ids: Vec<String>,
}

/// Merge the stored shape (or `defaults` when there is none) with the remote records.
pub fn reconcile(
    stored: Option<&[IndexNode]>,
    records: &[ContentRecord],
    defaults: &[IndexNode],
    options: ReconcileOptions,
) -> ReconcileOutcome {
    let shape = match stored {
        Some(stored) if options.merge_default_topics => merge_default_topics(stored, defaults),
        Some(stored) => stored.to_vec(),
        None => defaults.to_vec(),
    };
    let shape = ensure_unique_ids(&shape);

    let content_map: HashMap<&str, Option<&Vec<String>>> = records
        .iter()
        .map(|r| (r.id.as_str(), r.content.as_ref()))
        .collect();

    let mut legacy_matches = Vec::new();
    let mut tree = map_content(&shape, None, &content_map, &mut legacy_matches);

    let mut claimed: HashSet<&str> = flatten(&tree).into_iter().map(|n| n.id.as_str()).collect();
    claimed.extend(legacy_matches.iter().map(|(_, key)| key.as_str()));

    // Last record per id wins, first appearance fixes the order.
    let mut orphan_ids: Vec<String> = Vec::new();
    for r in records {
        if !claimed.contains(r.id.as_str()) && !orphan_ids.contains(&r.id) {
            orphan_ids.push(r.id.clone());
        }
    }

    let mut recovered_folder_id = None;
    if !orphan_ids.is_empty() {
        let folder_id = recovered_folder_id_for(&tree, options.now_ms);
        log!(
            "recovered {} orphaned slide(s) into {folder_id}: {orphan_ids:?}",
            orphan_ids.len()
        );
        let leaves = orphan_ids
            .iter()
            .map(|id| IndexNode {
                id: id.clone(),
                title: id.clone(),
                parent_id: Some(folder_id.clone()),
                children: None,
                content: content_map.get(id.as_str()).copied().flatten().cloned(),
            })
            .collect();
        tree.push(IndexNode::container(folder_id.clone(), RECOVERED_FOLDER_TITLE).with_children(leaves));
        recovered_folder_id = Some(folder_id);
    }

    ReconcileOutcome {
        tree,
        recovered_folder_id,
        legacy_matches,
        orphan_ids,
    }
}

fn recovered_folder_id_for(tree: &[IndexNode], now_ms: i64) -> String {
    let base = format!("{RECOVERED_FOLDER_PREFIX}{now_ms}");
    let mut id = base.clone();
    let mut n = 2;
    while find_node(tree, &id).is_some() {
        id = format!("{base}-{n}");
        n += 1;
    }
    id
}

fn map_content(
    items: &[IndexNode],
    parent_id: Option<&str>,
    content_map: &HashMap<&str, Option<&Vec<String>>>,
    legacy_matches: &mut Vec<(String, String)>,
) -> Vec<IndexNode> {
    items
        .iter()
        .map(|item| {
            let mut node = item.clone();

            let exact = content_map.get(item.id.as_str()).copied();
            let exact_has_content = exact.flatten().is_some_and(|c| !c.is_empty());

            let legacy_parent = parent_id.or(item.parent_id.as_deref());
            let legacy = legacy_parent
                .and_then(|p| item.id.strip_prefix(p)?.strip_prefix('-'))
                .filter(|key| !key.is_empty())
                .and_then(|key| {
                    let content = content_map.get(key).copied().flatten()?;
                    (!content.is_empty()).then_some((key, content))
                });

            if exact_has_content {
                node.content = exact.flatten().cloned();
            } else if let Some((key, content)) = legacy {
                node.content = Some(content.clone());
                legacy_matches.push((item.id.clone(), key.to_string()));
            } else if let Some(exact) = exact {
                node.content = exact.cloned();
            }

            if let Some(children) = item.children.as_deref() {
                node.children = Some(map_content(children, Some(&item.id), content_map, legacy_matches));
            }
            node
        })
        .collect()
}

/// Where the initial tree came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadSource {
    Remote(ReconcileOutcome),
    /// The remote listing failed after retries; the tree is the default outline.
    Offline(StoreError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadedTree {
    pub tree: Vec<IndexNode>,
    pub source: LoadSource,
}

impl LoadedTree {
    pub fn is_offline(&self) -> bool {
        matches!(self.source, LoadSource::Offline(_))
    }
}

/// Load the stored shape and remote listing, reconcile them and store the new baseline.
///
/// Never fails: when the listing cannot be fetched the default outline comes back without
/// content and the stored shape is left alone.
pub async fn load_tree<R, C, A, S>(
    cache: &WriteBehindCache<R, C, A>,
    shapes: &S,
    defaults: &[IndexNode],
    merge_defaults: bool,
) -> LoadedTree
where
    R: RemoteStore + 'static,
    C: Clock + 'static,
    A: Alarm + 'static,
    S: ShapeStore + ?Sized,
{
    let stored = shapes.get_shape();

    match cache.load_all_cached().await {
        Ok(records) => {
            let options = ReconcileOptions {
                merge_default_topics: merge_defaults,
                now_ms: cache.clock().now_ms(),
            };
            let outcome = reconcile(stored.as_deref(), &records, defaults, options);
            shapes.set_shape(&outcome.tree);
            LoadedTree {
                tree: outcome.tree.clone(),
                source: LoadSource::Remote(outcome),
            }
        }
        Err(e) => {
            error!("failed to restore slides, falling back to the default outline: {e}");
            LoadedTree {
                tree: ensure_unique_ids(defaults),
                source: LoadSource::Offline(e),
            }
        }
    }
}
