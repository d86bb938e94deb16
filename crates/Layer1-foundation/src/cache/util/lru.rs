//! Lightweight LRU Cache implementation
//!
//! Recency is tracked with a monotonically increasing access counter, so
//! eviction is a linear scan for the smallest stamp. Tier-1 capacities are
//! small enough that this beats maintaining a linked list.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// A simple LRU (Least Recently Used) cache
///
/// Both `get` and `insert` refresh an entry's recency. Inserting a new key
/// into a full cache evicts exactly one entry: the least recently used.
#[derive(Debug)]
pub struct LruCache<K, V> {
    /// Storage for cached items
    entries: HashMap<K, LruEntry<V>>,
    /// Maximum number of entries
    capacity: usize,
    /// Access counter for LRU tracking
    access_counter: u64,
}

#[derive(Debug)]
struct LruEntry<V> {
    value: V,
    last_access: u64,
}

impl<K: Eq + Hash + Clone, V> LruCache<K, V> {
    /// Create a new LRU cache with the given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            capacity,
            access_counter: 0,
        }
    }

    /// Get a reference to a cached value
    ///
    /// Updates the access time for LRU tracking.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.access_counter += 1;
        if let Some(entry) = self.entries.get_mut(key) {
            entry.last_access = self.access_counter;
            Some(&entry.value)
        } else {
            None
        }
    }

    /// Look at a value without touching its recency
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|e| &e.value)
    }

    /// Check if a key exists without updating access time
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert a value into the cache
    ///
    /// If the cache is at capacity, the least recently used item is evicted.
    /// Returns the previous value when the key was already present.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.access_counter += 1;

        if let Some(entry) = self.entries.get_mut(&key) {
            let old_value = std::mem::replace(&mut entry.value, value);
            entry.last_access = self.access_counter;
            return Some(old_value);
        }

        while self.entries.len() >= self.capacity && !self.entries.is_empty() {
            self.evict_lru();
        }

        self.entries.insert(
            key,
            LruEntry {
                value,
                last_access: self.access_counter,
            },
        );

        None
    }

    /// Remove a specific key from the cache
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|e| e.value)
    }

    /// Remove all entries for which the predicate returns false
    ///
    /// Returns the number of removed entries.
    pub fn retain<F>(&mut self, mut f: F) -> usize
    where
        F: FnMut(&K, &V) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|k, e| f(k, &e.value));
        before - self.entries.len()
    }

    /// Clear all entries
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Get the number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Evict the least recently used entry
    fn evict_lru(&mut self) -> Option<K> {
        let lru_key = self.find_lru_key()?;
        self.entries.remove(&lru_key);
        Some(lru_key)
    }

    /// Find the key with the oldest access time
    fn find_lru_key(&self) -> Option<K> {
        self.entries
            .iter()
            .min_by_key(|(_, e)| e.last_access)
            .map(|(k, _)| k.clone())
    }
}

/// LRU Cache with TTL (Time-To-Live) support
///
/// Expiry is lazy: an expired entry stays in memory until it is looked up,
/// swept by [`TtlLruCache::cleanup_expired`], or reclaimed by an insert into
/// a full cache.
#[derive(Debug)]
pub struct TtlLruCache<K, V> {
    inner: LruCache<K, TtlEntry<V>>,
    default_ttl: Duration,
}

#[derive(Debug)]
struct TtlEntry<V> {
    value: V,
    /// `None` when the TTL reaches past what `Instant` can represent
    expires_at: Option<Instant>,
}

impl<V> TtlEntry<V> {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

impl<K: Eq + Hash + Clone, V> TtlLruCache<K, V> {
    /// Create a new TTL-enabled LRU cache
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        Self {
            inner: LruCache::new(capacity),
            default_ttl,
        }
    }

    /// Get a value if it exists and hasn't expired
    ///
    /// An expired entry is removed and reported as absent.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let now = Instant::now();
        match self.inner.peek(key) {
            Some(entry) if entry.is_live(now) => self.inner.get(key).map(|e| &e.value),
            Some(_) => {
                self.inner.remove(key);
                None
            }
            None => None,
        }
    }

    /// Insert a value with the default TTL
    pub fn insert(&mut self, key: K, value: V) {
        self.insert_with_ttl(key, value, self.default_ttl);
    }

    /// Insert a value with a custom TTL
    pub fn insert_with_ttl(&mut self, key: K, value: V, ttl: Duration) {
        if !self.inner.contains(&key) && self.inner.len() >= self.inner.capacity() {
            // Reclaim dead entries before sacrificing a live one.
            self.cleanup_expired();
        }
        let entry = TtlEntry {
            value,
            expires_at: Instant::now().checked_add(ttl),
        };
        self.inner.insert(key, entry);
    }

    /// Remove expired entries, returning how many were dropped
    pub fn cleanup_expired(&mut self) -> usize {
        let now = Instant::now();
        self.inner.retain(|_, e| e.is_live(now))
    }

    /// Keep only the entries for which the predicate returns true
    pub fn retain<F>(&mut self, mut f: F) -> usize
    where
        F: FnMut(&K, &V) -> bool,
    {
        self.inner.retain(|k, e| f(k, &e.value))
    }

    /// Remove a specific key
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.inner.remove(key).map(|e| e.value)
    }

    /// Clear all entries
    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Get the number of entries (including potentially expired ones)
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if cache is empty
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }
}
