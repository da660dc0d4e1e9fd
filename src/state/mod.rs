use crate::api::{ApiClient, RemoteStore, StoreError, StoreErrorKind, StoreResult};
use crate::config::SyncConfig;
use crate::defaults::default_outline;
use crate::models::{IndexNode, PasteMode, SubSlideRef};
use crate::reconcile::{self, LoadedTree};
use crate::slides::{move_sub_slide, paste_sub_slides, SubSlideClipboard};
use crate::storage::{LocalShapeStore, ShapeStore};
use crate::sync::{Alarm, BrowserClock, Clock, TimeoutAlarm, WriteBehindCache};
use crate::tree::{self, find_node, set_content};
use futures::future::{join_all, LocalBoxFuture};
use futures::FutureExt;
use leptos::logging::{error, warn};
use leptos::prelude::*;
use std::sync::Arc;

/// Composition root for the slide index: the reactive tree plus the engines behind it.
///
/// Tree edits apply locally at once and persist the shape; content edits additionally go
/// through the write-behind cache. After a quota error remote writes stop for the session
/// (`writes_disabled`) while local edits keep working.
pub struct OutlineController<R, C, A, S: ?Sized> {
    pub tree: RwSignal<Vec<IndexNode>>,
    pub is_loaded: RwSignal<bool>,
    pub is_offline: RwSignal<bool>,
    pub writes_disabled: RwSignal<bool>,

    engine: WriteBehindCache<R, C, A>,
    shapes: Arc<S>,
    defaults: Arc<Vec<IndexNode>>,
    merge_defaults: bool,
}

impl<R, C, A, S: ?Sized> Clone for OutlineController<R, C, A, S> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree,
            is_loaded: self.is_loaded,
            is_offline: self.is_offline,
            writes_disabled: self.writes_disabled,
            engine: self.engine.clone(),
            shapes: self.shapes.clone(),
            defaults: self.defaults.clone(),
            merge_defaults: self.merge_defaults,
        }
    }
}

/// The browser wiring: HTTP store, wall clock, `setTimeout` debounce, localStorage shape.
pub type BrowserOutline = OutlineController<ApiClient, BrowserClock, TimeoutAlarm, LocalShapeStore>;

impl BrowserOutline {
    pub fn from_config(config: &SyncConfig) -> Self {
        let engine = WriteBehindCache::new(
            ApiClient::from_config(config),
            BrowserClock,
            TimeoutAlarm::new(),
            config,
        );
        let shapes = LocalShapeStore::new(config.shape_storage_key.clone());
        Self::new(engine, Arc::new(shapes), default_outline(), config.merge_default_topics)
    }
}

impl<R, C, A, S> OutlineController<R, C, A, S>
where
    R: RemoteStore + 'static,
    C: Clock + 'static,
    A: Alarm + 'static,
    S: ShapeStore + ?Sized,
{
    pub fn new(
        engine: WriteBehindCache<R, C, A>,
        shapes: Arc<S>,
        defaults: Vec<IndexNode>,
        merge_defaults: bool,
    ) -> Self {
        let writes_disabled = RwSignal::new(false);
        engine.set_failure_listener(move |id, e| {
            if e.is_quota_exceeded() && !writes_disabled.get_untracked() {
                error!("disabling remote writes for this session after a quota error on {id}");
                writes_disabled.set(true);
            }
        });

        Self {
            tree: RwSignal::new(vec![]),
            is_loaded: RwSignal::new(false),
            is_offline: RwSignal::new(false),
            writes_disabled,
            engine,
            shapes,
            defaults: Arc::new(defaults),
            merge_defaults,
        }
    }

    pub fn engine(&self) -> &WriteBehindCache<R, C, A> {
        &self.engine
    }

    /// Restore the tree from the stored shape and the remote content. Always ends loaded.
    pub async fn load_tree(&self) -> LoadedTree {
        let loaded = reconcile::load_tree(
            &self.engine,
            &*self.shapes,
            &self.defaults,
            self.merge_defaults,
        )
        .await;
        self.tree.set(loaded.tree.clone());
        self.is_offline.set(loaded.is_offline());
        self.is_loaded.set(true);
        loaded
    }

    /// Adopt `tree` and persist its shape locally.
    pub fn on_change(&self, tree: Vec<IndexNode>) {
        self.shapes.set_shape(&tree);
        self.tree.set(tree);
    }

    fn apply(&self, next: Vec<IndexNode>) -> bool {
        let changed = self.tree.with_untracked(|t| *t != next);
        if changed {
            self.on_change(next);
        }
        changed
    }

    /// Move `ids` under `dest_parent_id` at `dest_index`. Returns whether the tree changed.
    pub fn relocate(&self, ids: &[String], dest_parent_id: Option<&str>, dest_index: usize) -> bool {
        let next = self
            .tree
            .with_untracked(|t| tree::relocate(t, ids, dest_parent_id, dest_index));
        self.apply(next)
    }

    /// Drag-and-drop reorder: `drag_id` lands right before `drop_id`.
    pub fn move_item(&self, drag_id: &str, drop_id: &str) -> bool {
        let next = self
            .tree
            .with_untracked(|t| tree::move_item(t, drag_id, drop_id));
        self.apply(next)
    }

    pub fn move_sub_slide(
        &self,
        source_parent_id: &str,
        source_index: usize,
        dest_parent_id: &str,
        dest_index: usize,
    ) -> LocalBoxFuture<'static, StoreResult<()>> {
        let next = self.tree.with_untracked(|t| {
            move_sub_slide(t, source_parent_id, source_index, dest_parent_id, dest_index)
        });
        if !self.apply(next) {
            return async { Ok(()) }.boxed_local();
        }
        self.push_content(&[source_parent_id, dest_parent_id])
    }

    pub fn paste_sub_slides(
        &self,
        mode: PasteMode,
        sources: &[SubSlideRef],
        dest_parent_id: &str,
        dest_index: usize,
        htmls: &[String],
    ) -> LocalBoxFuture<'static, StoreResult<()>> {
        let next = self.tree.with_untracked(|t| {
            paste_sub_slides(t, mode, sources, dest_parent_id, dest_index, htmls)
        });
        if !self.apply(next) {
            return async { Ok(()) }.boxed_local();
        }

        let mut touched: Vec<&str> = vec![dest_parent_id];
        if mode == PasteMode::Cut {
            touched.extend(sources.iter().map(|s| s.parent_id.as_str()));
        }
        self.push_content(&touched)
    }

    /// Paste a captured clipboard. Returns whether it can be pasted again and the outcome of
    /// the content writes.
    pub fn paste_clipboard(
        &self,
        clipboard: &SubSlideClipboard,
        dest_parent_id: &str,
        dest_index: usize,
    ) -> (bool, LocalBoxFuture<'static, StoreResult<()>>) {
        let done = self.paste_sub_slides(
            clipboard.mode,
            &clipboard.sources,
            dest_parent_id,
            dest_index,
            &clipboard.htmls,
        );
        (clipboard.mode == PasteMode::Copy, done)
    }

    /// Replace the content of `id` locally and queue the remote write.
    pub fn save(&self, id: &str, content: Option<Vec<String>>) -> LocalBoxFuture<'static, StoreResult<()>> {
        self.tree.update(|t| *t = set_content(t, id, content.clone()));
        self.send(id, content)
    }

    /// Clear `id` locally and delete its remote record.
    pub fn delete(&self, id: &str) -> LocalBoxFuture<'static, StoreResult<()>> {
        self.tree.update(|t| *t = set_content(t, id, None));
        if self.writes_disabled.get_untracked() {
            return async { Err(writes_disabled_error()) }.boxed_local();
        }

        let engine = self.engine.clone();
        let id = id.to_string();
        async move { engine.delete(&id).await }.boxed_local()
    }

    /// Write out everything still waiting for the debounce window (page hide).
    pub async fn flush(&self) {
        self.engine.flush_now().await;
    }

    fn send(&self, id: &str, content: Option<Vec<String>>) -> LocalBoxFuture<'static, StoreResult<()>> {
        if self.writes_disabled.get_untracked() {
            warn!("skipping remote save of {id}: remote writes are disabled for this session");
            return async { Err(writes_disabled_error()) }.boxed_local();
        }
        self.engine.save(id, content).boxed_local()
    }

    fn push_content(&self, ids: &[&str]) -> LocalBoxFuture<'static, StoreResult<()>> {
        let mut seen: Vec<&str> = Vec::new();
        let mut pending = Vec::new();
        for &id in ids {
            if seen.contains(&id) {
                continue;
            }
            seen.push(id);
            let content = self
                .tree
                .with_untracked(|t| find_node(t, id).and_then(|n| n.content.clone()));
            pending.push(self.send(id, content));
        }

        async move { join_all(pending).await.into_iter().collect() }.boxed_local()
    }
}

fn writes_disabled_error() -> StoreError {
    StoreError::new(
        StoreErrorKind::ResourceExhausted,
        "remote writes are disabled for this session",
    )
}
