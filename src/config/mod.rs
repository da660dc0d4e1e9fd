use crate::api::DEFAULT_CHUNK_MAX_BYTES;
use serde::{Deserialize, Serialize};

/// Tunables of the index store and its sync engine.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct SyncConfig {
    pub api_url: String,

    /// Quiet period after the last `save` before the queue drains.
    pub debounce_ms: u64,

    /// Lifetime of the cached full listing.
    pub cache_ttl_ms: u64,

    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_jitter_ms: u64,

    /// localStorage key of the persisted tree shape.
    pub shape_storage_key: String,

    pub chunk_max_bytes: usize,

    /// Add default topics missing from a stored shape during load.
    pub merge_default_topics: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:6689".to_string(),
            debounce_ms: 1_200,
            cache_ttl_ms: 30_000,
            retry_attempts: 3,
            retry_base_delay_ms: 300,
            retry_max_jitter_ms: 100,
            shape_storage_key: "presentation-index".to_string(),
            chunk_max_bytes: DEFAULT_CHUNK_MAX_BYTES,
            merge_default_topics: false,
        }
    }
}

impl SyncConfig {
    /// Defaults, with the API URL taken from `window.ENV` when the page provides one.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(api_url) = env_api_url() {
            config.api_url = api_url;
        }
        config
    }
}

// We support BOTH `window.ENV.API_URL` and `window.ENV.api_url`.
#[cfg(target_arch = "wasm32")]
fn env_api_url() -> Option<String> {
    let window = web_sys::window()?;
    let env = window.get("ENV")?;
    if env.is_undefined() || !env.is_object() {
        return None;
    }

    ["API_URL", "api_url"].into_iter().find_map(|key| {
        js_sys::Reflect::get(&env, &key.into())
            .ok()
            .and_then(|v| v.as_string())
    })
}

#[cfg(not(target_arch = "wasm32"))]
fn env_api_url() -> Option<String> {
    std::env::var("API_URL").ok().filter(|v| !v.trim().is_empty())
}
