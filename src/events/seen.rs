//! Bounded recently-seen set for message deduplication.

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

pub struct SeenSet {
    inner: Mutex<LruCache<String, ()>>,
}

impl SeenSet {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Record `key`; returns `true` when it was not already present.
    pub fn insert(&self, key: &str) -> bool {
        self.inner.lock().put(key.to_string(), ()).is_none()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().contains(key)
    }
}

impl std::fmt::Debug for SeenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeenSet").field("len", &self.inner.lock().len()).finish()
    }
}
