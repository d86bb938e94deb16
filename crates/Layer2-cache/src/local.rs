//! Tier 1: in-process response cache

use crate::key::CacheKey;
use parking_lot::Mutex;
use retain_foundation::{LocalCacheConfig, TtlLruCache};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Bounded LRU + TTL cache guarded by a single lock
///
/// Every operation holds the lock for a short, non-suspending critical
/// section, so concurrent callers never observe a half-applied eviction.
pub struct LocalCache {
    entries: Mutex<TtlLruCache<CacheKey, String>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl LocalCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(TtlLruCache::new(capacity, ttl)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &LocalCacheConfig) -> Self {
        Self::new(config.capacity, config.ttl())
    }

    /// Live value for `key`, refreshing its recency
    ///
    /// Absent and expired entries both count as a miss.
    pub fn get(&self, key: &CacheKey) -> Option<String> {
        let value = self.entries.lock().get(key).cloned();
        match value {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        value
    }

    /// Store with the default TTL
    pub fn set(&self, key: CacheKey, value: String) {
        self.entries.lock().insert(key, value);
    }

    pub fn set_with_ttl(&self, key: CacheKey, value: String, ttl: Duration) {
        self.entries.lock().insert_with_ttl(key, value, ttl);
    }

    pub fn delete(&self, key: &CacheKey) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    /// Drop every entry, returning how many were held
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.lock();
        let dropped = entries.len();
        entries.clear();
        dropped
    }

    /// Drop the entries produced for one model
    pub fn invalidate_model(&self, model: &str) -> usize {
        self.entries.lock().retain(|key, _| key.model() != model)
    }

    /// Number of stored entries, expired ones not yet reclaimed included
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().capacity()
    }

    pub fn stats(&self) -> LocalCacheStats {
        let entries = self.entries.lock();
        LocalCacheStats {
            size: entries.len(),
            capacity: entries.capacity(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for LocalCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCache")
            .field("stats", &self.stats())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalCacheStats {
    pub size: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
}

impl LocalCacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::KeyDeriver;

    fn key(prompt: &str) -> CacheKey {
        KeyDeriver::new("test").derive("model-a", prompt, None)
    }

    #[test]
    fn test_round_trip() {
        let cache = LocalCache::new(4, Duration::from_secs(60));
        cache.set(key("one"), "uno".to_string());

        assert_eq!(cache.get(&key("one")), Some("uno".to_string()));
        assert_eq!(cache.get(&key("two")), None);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_evicts_exactly_one_lru_entry() {
        let cache = LocalCache::new(3, Duration::from_secs(60));
        for p in ["a", "b", "c"] {
            cache.set(key(p), p.to_string());
        }

        cache.set(key("d"), "d".to_string());

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get(&key("a")), None);
        assert_eq!(cache.get(&key("b")), Some("b".to_string()));
        assert_eq!(cache.get(&key("d")), Some("d".to_string()));
    }

    #[test]
    fn test_get_refreshes_recency() {
        let cache = LocalCache::new(2, Duration::from_secs(60));
        cache.set(key("a"), "a".to_string());
        cache.set(key("b"), "b".to_string());

        assert!(cache.get(&key("a")).is_some());
        cache.set(key("c"), "c".to_string());

        assert!(cache.get(&key("a")).is_some());
        assert!(cache.get(&key("b")).is_none());
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let cache = LocalCache::new(2, Duration::from_secs(60));
        cache.set_with_ttl(key("gone"), "x".to_string(), Duration::from_millis(0));

        assert_eq!(cache.get(&key("gone")), None);
        assert_eq!(cache.stats().misses, 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_unrepresentable_ttl_does_not_panic() {
        let cache = LocalCache::new(2, Duration::from_secs(u64::MAX));
        cache.set(key("forever"), "x".to_string());
        cache.set_with_ttl(key("also"), "y".to_string(), Duration::MAX);

        assert_eq!(cache.get(&key("forever")), Some("x".to_string()));
        assert_eq!(cache.get(&key("also")), Some("y".to_string()));
    }

    #[test]
    fn test_invalidate_model_is_scoped() {
        let deriver = KeyDeriver::new("test");
        let cache = LocalCache::new(8, Duration::from_secs(60));
        cache.set(deriver.derive("qwen2.5", "p", None), "1".to_string());
        cache.set(deriver.derive("qwen2.5:8b", "p", None), "2".to_string());

        assert_eq!(cache.invalidate_model("qwen2.5"), 1);
        assert_eq!(
            cache.get(&deriver.derive("qwen2.5:8b", "p", None)),
            Some("2".to_string())
        );
        assert_eq!(cache.clear(), 1);
    }
}
