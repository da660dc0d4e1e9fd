/// Single-entry read-through cache with an absolute expiry.
#[derive(Clone, Debug)]
pub struct ListingCache<T> {
    entry: Option<CacheEntry<T>>,
}

#[derive(Clone, Debug)]
struct CacheEntry<T> {
    value: T,
    expires_at: i64,
}

impl<T> Default for ListingCache<T> {
    fn default() -> Self {
        Self { entry: None }
    }
}

impl<T: Clone> ListingCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached value while `now_ms` is before its expiry.
    pub fn get(&self, now_ms: i64) -> Option<T> {
        self.entry
            .as_ref()
            .filter(|e| now_ms < e.expires_at)
            .map(|e| e.value.clone())
    }

    pub fn put(&mut self, value: T, now_ms: i64, ttl_ms: u64) {
        self.entry = Some(CacheEntry {
            value,
            expires_at: now_ms.saturating_add(ttl_ms as i64),
        });
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    pub fn expires_at(&self) -> Option<i64> {
        self.entry.as_ref().map(|e| e.expires_at)
    }
}
