use super::paste_sub_slides;
use crate::models::{IndexNode, PasteMode, SubSlideRef};
use crate::tree::find_node;
use std::collections::BTreeSet;

const DRAG_PREFIX: &str = "subslide";

/// Sub-slides captured by a copy or cut, ready to be pasted elsewhere.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubSlideClipboard {
    pub mode: PasteMode,
    pub sources: Vec<SubSlideRef>,
    pub htmls: Vec<String>,
}

impl SubSlideClipboard {
    /// Read the HTML of `refs` out of `tree`, ordered by (parent, index).
    ///
    /// Refs that do not resolve are dropped from both `sources` and `htmls`, so a cut never
    /// removes more entries than it re-inserts. `None` when nothing resolves.
    pub fn capture(tree: &[IndexNode], mode: PasteMode, refs: &[SubSlideRef]) -> Option<Self> {
        let ordered: BTreeSet<&SubSlideRef> = refs.iter().collect();

        let mut sources = Vec::with_capacity(ordered.len());
        let mut htmls = Vec::with_capacity(ordered.len());
        for r in ordered {
            let html = find_node(tree, &r.parent_id)
                .and_then(|n| n.content.as_ref())
                .and_then(|c| c.get(r.index));
            if let Some(html) = html {
                sources.push(r.clone());
                htmls.push(html.clone());
            }
        }

        if htmls.is_empty() {
            return None;
        }
        Some(Self {
            mode,
            sources,
            htmls,
        })
    }

    /// Apply the paste. Returns the new tree and whether the clipboard is still usable
    /// (a cut can only be pasted once).
    pub fn paste_into(
        &self,
        tree: &[IndexNode],
        dest_parent_id: &str,
        dest_index: usize,
    ) -> (Vec<IndexNode>, bool) {
        let next = paste_sub_slides(
            tree,
            self.mode,
            &self.sources,
            dest_parent_id,
            dest_index,
            &self.htmls,
        );
        (next, self.mode == PasteMode::Copy)
    }
}

/// Multi-select state for sub-slide thumbnails.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubSlideSelection {
    selected: BTreeSet<SubSlideRef>,
    anchor: Option<SubSlideRef>,
}

impl SubSlideSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plain click: select only this one and make it the anchor.
    pub fn click(&mut self, r: SubSlideRef) {
        self.selected.clear();
        self.selected.insert(r.clone());
        self.anchor = Some(r);
    }

    /// Ctrl/Cmd click: flip membership and move the anchor.
    pub fn toggle(&mut self, r: SubSlideRef) {
        if !self.selected.remove(&r) {
            self.selected.insert(r.clone());
        }
        self.anchor = Some(r);
    }

    /// Shift click: select the span between the anchor and `r` inside the anchor's node.
    /// Without an anchor in the same node it behaves like a plain click.
    pub fn extend_to(&mut self, r: SubSlideRef, additive: bool) {
        let Some(anchor) = self.anchor.clone().filter(|a| a.parent_id == r.parent_id) else {
            if additive {
                self.toggle(r);
            } else {
                self.click(r);
            }
            return;
        };

        if !additive {
            self.selected.clear();
        }
        let (start, end) = if anchor.index <= r.index {
            (anchor.index, r.index)
        } else {
            (r.index, anchor.index)
        };
        for index in start..=end {
            self.selected.insert(SubSlideRef::new(r.parent_id.clone(), index));
        }
    }

    pub fn clear(&mut self) {
        self.selected.clear();
        self.anchor = None;
    }

    pub fn contains(&self, r: &SubSlideRef) -> bool {
        self.selected.contains(r)
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn refs(&self) -> Vec<SubSlideRef> {
        self.selected.iter().cloned().collect()
    }
}

/// Drag payload for a single sub-slide: `subslide|<parent>|<index>`.
pub fn encode_sub_slide_drag(r: &SubSlideRef) -> String {
    format!("{DRAG_PREFIX}|{}|{}", r.parent_id, r.index)
}

pub fn decode_sub_slide_drag(raw: &str) -> Option<SubSlideRef> {
    let mut parts = raw.split('|');
    let (Some(kind), Some(parent), Some(index), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return None;
    };
    if kind != DRAG_PREFIX || parent.is_empty() {
        return None;
    }
    let index = index.parse::<usize>().ok()?;
    Some(SubSlideRef::new(parent, index))
}
