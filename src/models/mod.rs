use serde::{Deserialize, Serialize};

/// One node of the presentation index.
///
/// `children` present (even empty) marks a container, `content` present marks a leaf.
/// A node may carry both; renderers give `children` precedence.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IndexNode {
    pub id: String,

    #[serde(default)]
    pub title: String,

    /// Back-reference hint only. The owning `children` array is authoritative.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<IndexNode>>,

    /// Ordered sub-slide HTML. `null` and a missing field read the same.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<String>>,
}

impl IndexNode {
    pub fn container(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            children: Some(vec![]),
            ..Default::default()
        }
    }

    pub fn leaf(id: impl Into<String>, title: impl Into<String>, content: Vec<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: Some(content),
            ..Default::default()
        }
    }

    pub fn with_children(mut self, children: Vec<IndexNode>) -> Self {
        self.children = Some(children);
        self
    }

    pub fn is_container(&self) -> bool {
        self.children.is_some()
    }

    pub fn has_children(&self) -> bool {
        self.children.as_ref().is_some_and(|c| !c.is_empty())
    }

    pub fn children(&self) -> &[IndexNode] {
        self.children.as_deref().unwrap_or(&[])
    }

    pub fn sub_slide_count(&self) -> usize {
        self.content.as_ref().map_or(0, Vec::len)
    }
}

/// Authoritative remote unit of content, keyed by node id.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ContentRecord {
    pub id: String,
    #[serde(default)]
    pub content: Option<Vec<String>>,
}

impl ContentRecord {
    pub fn new(id: impl Into<String>, content: Option<Vec<String>>) -> Self {
        Self {
            id: id.into(),
            content,
        }
    }

    pub fn has_content(&self) -> bool {
        self.content.as_ref().is_some_and(|c| !c.is_empty())
    }
}

/// Tree structure with every `content` stripped, as kept in the local ephemeral store.
pub type PersistedTreeShape = Vec<IndexNode>;

/// Address of one sub-slide: the owning node and the position inside its `content`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub struct SubSlideRef {
    pub parent_id: String,
    pub index: usize,
}

impl SubSlideRef {
    pub fn new(parent_id: impl Into<String>, index: usize) -> Self {
        Self {
            parent_id: parent_id.into(),
            index,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum PasteMode {
    Copy,
    Cut,
}
