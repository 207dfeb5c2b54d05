//! FILENAME: core/pivot-pipeline/src/cache.rs
//! Bounded least-recently-used caches for normalized input and results.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use pivot_engine::{NormalizedInput, PivotResult};

use crate::fingerprint::{InputFingerprint, ResultFingerprint};

pub type InputCache = BoundedCache<InputFingerprint, Arc<NormalizedInput>>;
pub type ResultCache = BoundedCache<ResultFingerprint, Arc<PivotResult>>;

/// `get` promotes the entry; `put` evicts the least recently touched
/// entry only when the cache is full. A capacity of 0 is treated as 1.
pub struct BoundedCache<K: Hash + Eq, V> {
    entries: LruCache<K, V>,
}

impl<K: Hash + Eq, V: Clone> BoundedCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        BoundedCache { entries: LruCache::new(capacity) }
    }

    pub fn get(&mut self, key: &K) -> Option<V> {
        self.entries.get(key).cloned()
    }

    /// Returns the evicted key, if storing this entry pushed one out.
    pub fn put(&mut self, key: K, value: V) -> Option<K> {
        if self.entries.contains(&key) {
            self.entries.put(key, value);
            return None;
        }
        self.entries.push(key, value).map(|(evicted, _)| evicted)
    }

    /// Membership test that does not touch recency.
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_least_recently_used() {
        let mut cache: BoundedCache<&str, u32> = BoundedCache::new(2);
        cache.put("a", 1);
        cache.put("b", 2);
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.put("c", 3), Some("b"));
        assert!(cache.contains(&"a"));
        assert!(!cache.contains(&"b"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let mut cache: BoundedCache<&str, u32> = BoundedCache::new(2);
        cache.put("a", 1);
        cache.put("b", 2);
        assert_eq!(cache.put("a", 10), None);
        assert_eq!(cache.get(&"a"), Some(10));
        assert!(cache.contains(&"b"));
    }

    #[test]
    fn test_get_and_clear() {
        let mut cache: BoundedCache<u8, u8> = BoundedCache::new(1);
        assert_eq!(cache.get(&1), None);
        cache.put(1, 1);
        assert_eq!(cache.get(&1), Some(1));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_capacity_holds_one_entry() {
        let mut cache: BoundedCache<u8, u8> = BoundedCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.put(1, 1);
        assert_eq!(cache.put(2, 2), Some(1));
    }
}
