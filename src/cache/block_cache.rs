//! Bounded LRU cache of materialized blocks.
//!
//! The recency order lives behind one mutex, so `get`/`put` from the query
//! path and the prefetch service never interleave inside an update. The cache
//! is read-through only: eviction drops the payload, the store stays the
//! source of truth.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use crate::catalog::block::BlockId;
use crate::config::ConfigError;

/// Point-in-time view of the cache for monitoring.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub capacity: usize,
    pub size: usize,
    /// Least recently used first.
    pub cached_blocks: Vec<BlockId>,
    pub hits: u64,
    pub misses: u64,
}

pub struct BlockCache<P> {
    entries: Mutex<LruCache<BlockId, P>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Cache shared between the query path and the prefetch service.
pub type SharedBlockCache<P> = Arc<BlockCache<P>>;

impl<P: Clone> BlockCache<P> {
    /// Create a cache holding at most `capacity` blocks.
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        let cap = NonZeroUsize::new(capacity)
            .ok_or_else(|| ConfigError::Invalid("cache capacity must be at least 1".to_string()))?;
        Ok(Self {
            entries: Mutex::new(LruCache::new(cap)),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// Look up a block, promoting it to most recently used on a hit.
    pub fn get(&self, block_id: BlockId) -> Option<P> {
        let found = self.entries.lock().get(&block_id).cloned();
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Insert or replace a block as most recently used.
    ///
    /// Returns the id evicted to make room, if any.
    pub fn put(&self, block_id: BlockId, payload: P) -> Option<BlockId> {
        let mut entries = self.entries.lock();
        if entries.contains(&block_id) {
            entries.put(block_id, payload);
            return None;
        }
        let evicted = entries.push(block_id, payload).map(|(id, _)| id);
        if let Some(evicted_id) = evicted {
            debug!(block_id, evicted = evicted_id, "Evicted block from cache");
        }
        evicted
    }

    /// Membership test; does not change recency.
    pub fn contains(&self, block_id: BlockId) -> bool {
        self.entries.lock().contains(&block_id)
    }

    pub fn remove(&self, block_id: BlockId) -> Option<P> {
        self.entries.lock().pop(&block_id)
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Cached block ids, least recently used first.
    pub fn cached_ids(&self) -> Vec<BlockId> {
        let entries = self.entries.lock();
        let mut ids: Vec<BlockId> = entries.iter().map(|(id, _)| *id).collect();
        ids.reverse();
        ids
    }

    pub fn stats(&self) -> CacheStats {
        let cached_blocks = self.cached_ids();
        CacheStats {
            capacity: self.capacity,
            size: cached_blocks.len(),
            cached_blocks,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(BlockCache::<u32>::new(0).is_err());
    }

    #[test]
    fn test_put_get_and_promotion() {
        let cache = BlockCache::new(2).unwrap();
        cache.put(1, "one");
        cache.put(2, "two");

        // Touch 1 so that 2 becomes the eviction victim.
        assert_eq!(cache.get(1), Some("one"));
        assert_eq!(cache.put(3, "three"), Some(2));

        assert!(cache.contains(1));
        assert!(!cache.contains(2));
        assert_eq!(cache.cached_ids(), vec![1, 3]);
    }

    #[test]
    fn test_replace_promotes_without_eviction() {
        let cache = BlockCache::new(2).unwrap();
        cache.put(1, 10);
        cache.put(2, 20);
        assert_eq!(cache.put(1, 11), None);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.cached_ids(), vec![2, 1]);
        assert_eq!(cache.get(1), Some(11));
    }

    #[test]
    fn test_contains_does_not_promote() {
        let cache = BlockCache::new(2).unwrap();
        cache.put(1, ());
        cache.put(2, ());
        assert!(cache.contains(1));
        assert_eq!(cache.put(3, ()), Some(1));
    }

    #[test]
    fn test_remove_and_clear() {
        let cache = BlockCache::new(4).unwrap();
        cache.put(1, 'a');
        cache.put(2, 'b');
        assert_eq!(cache.remove(1), Some('a'));
        assert_eq!(cache.remove(1), None);
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_stats_count_hits_and_misses() {
        let cache = BlockCache::new(4).unwrap();
        cache.put(7, 0u8);
        cache.get(7);
        cache.get(8);
        cache.get(9);

        let stats = cache.stats();
        assert_eq!(stats.capacity, 4);
        assert_eq!(stats.size, 1);
        assert_eq!(stats.cached_blocks, vec![7]);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
    }
}
