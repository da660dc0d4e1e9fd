//! Local ephemeral store for the tree shape.
//!
//! Best-effort by contract: reads that fail or do not parse come back as `None`, writes that
//! fail are logged and dropped. Nothing here is authoritative for content.

use crate::models::{IndexNode, PersistedTreeShape};
use crate::tree::strip_content;
use leptos::logging::{error, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("localStorage is not available")]
    Unavailable,
    #[error("could not serialize value: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("could not write `{key}`: {reason}")]
    Write { key: String, reason: String },
}

/// Where the stripped tree shape lives between sessions.
pub trait ShapeStore: Send + Sync {
    fn get_shape(&self) -> Option<PersistedTreeShape>;

    /// Persist the structure of `tree`. Content is stripped before writing.
    fn set_shape(&self, tree: &[IndexNode]);
}

#[cfg(target_arch = "wasm32")]
fn local_storage() -> Option<web_sys::Storage> {
    web_sys::window().and_then(|w| w.local_storage().ok().flatten())
}

#[cfg(not(target_arch = "wasm32"))]
fn local_storage() -> Option<web_sys::Storage> {
    None
}

pub(crate) fn load_json_from_storage<T: for<'de> Deserialize<'de>>(key: &str) -> Option<T> {
    let storage = local_storage()?;
    let json = storage.get_item(key).ok().flatten()?;
    match serde_json::from_str(&json) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("ignoring unreadable `{key}` in localStorage: {e}");
            None
        }
    }
}

pub(crate) fn save_json_to_storage<T: Serialize>(key: &str, value: &T) -> Result<(), StorageError> {
    let json = serde_json::to_string(value)?;
    let storage = local_storage().ok_or(StorageError::Unavailable)?;
    storage
        .set_item(key, &json)
        .map_err(|e| StorageError::Write {
            key: key.to_string(),
            reason: format!("{e:?}"),
        })
}

/// Browser localStorage under a single key.
#[derive(Clone, Debug)]
pub struct LocalShapeStore {
    key: String,
}

impl LocalShapeStore {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl ShapeStore for LocalShapeStore {
    fn get_shape(&self) -> Option<PersistedTreeShape> {
        load_json_from_storage(&self.key)
    }

    fn set_shape(&self, tree: &[IndexNode]) {
        if let Err(e) = save_json_to_storage(&self.key, &strip_content(tree)) {
            error!("failed to save index shape to localStorage: {e}");
        }
    }
}

/// In-process shape store, keyed like localStorage. Used off the browser and in tests.
#[derive(Clone, Debug, Default)]
pub struct MemoryShapeStore {
    key: String,
    items: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryShapeStore {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            items: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Raw stored text, for inspection.
    pub fn raw(&self) -> Option<String> {
        self.items.lock().ok()?.get(&self.key).cloned()
    }

    pub fn put_raw(&self, json: &str) {
        if let Ok(mut items) = self.items.lock() {
            items.insert(self.key.clone(), json.to_string());
        }
    }
}

impl ShapeStore for MemoryShapeStore {
    fn get_shape(&self) -> Option<PersistedTreeShape> {
        let json = self.raw()?;
        match serde_json::from_str(&json) {
            Ok(shape) => Some(shape),
            Err(e) => {
                warn!("ignoring unreadable index shape: {e}");
                None
            }
        }
    }

    fn set_shape(&self, tree: &[IndexNode]) {
        match serde_json::to_string(&strip_content(tree)) {
            Ok(json) => self.put_raw(&json),
            Err(e) => error!("failed to save index shape: {}", StorageError::from(e)),
        }
    }
}
