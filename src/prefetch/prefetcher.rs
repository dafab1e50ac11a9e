//! Read-through loader that warms the block cache.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::SharedBlockCache;
use crate::catalog::block::BlockId;
use crate::store::BlockStore;

/// Result of one prefetch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefetchStatus {
    /// Already cached, nothing read.
    Skipped,
    /// Read from the store and inserted.
    Prefetched,
    /// The store read failed; the cache is unchanged.
    Failed,
}

/// Tally of a batch of prefetch attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrefetchSummary {
    pub prefetched: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl PrefetchSummary {
    pub fn attempted(&self) -> usize {
        self.prefetched + self.skipped + self.failed
    }
}

pub struct Prefetcher<S: BlockStore> {
    store: Arc<S>,
    cache: SharedBlockCache<S::Payload>,
}

impl<S: BlockStore> Prefetcher<S> {
    pub fn new(store: Arc<S>, cache: SharedBlockCache<S::Payload>) -> Self {
        Self { store, cache }
    }

    /// Load a block into the cache unless it is already there.
    ///
    /// Store errors are logged and reported as [`PrefetchStatus::Failed`],
    /// never propagated.
    pub fn prefetch_block(&self, block_id: BlockId) -> PrefetchStatus {
        if self.cache.contains(block_id) {
            return PrefetchStatus::Skipped;
        }

        match self.store.read_block(block_id) {
            Ok(payload) => {
                self.cache.put(block_id, payload);
                debug!(block_id, "Prefetched block");
                PrefetchStatus::Prefetched
            }
            Err(e) => {
                warn!(block_id, error = %e, "Prefetch read failed");
                PrefetchStatus::Failed
            }
        }
    }

    pub fn prefetch_many(&self, block_ids: &[BlockId]) -> PrefetchSummary {
        let mut summary = PrefetchSummary::default();
        for &block_id in block_ids {
            match self.prefetch_block(block_id) {
                PrefetchStatus::Prefetched => summary.prefetched += 1,
                PrefetchStatus::Skipped => summary.skipped += 1,
                PrefetchStatus::Failed => summary.failed += 1,
            }
        }
        summary
    }

    pub fn cache(&self) -> &SharedBlockCache<S::Payload> {
        &self.cache
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::BlockCache;
    use crate::store::memory::MemoryStore;

    fn prefetcher(capacity: usize) -> Prefetcher<MemoryStore> {
        let store = Arc::new(MemoryStore::from_ranges("x", &[(0, 9), (10, 19), (20, 29)], 10));
        let cache = Arc::new(BlockCache::new(capacity).unwrap());
        Prefetcher::new(store, cache)
    }

    #[test]
    fn test_prefetch_then_skip() {
        let p = prefetcher(4);
        assert_eq!(p.prefetch_block(1), PrefetchStatus::Prefetched);
        assert!(p.cache().contains(1));
        assert_eq!(p.prefetch_block(1), PrefetchStatus::Skipped);
        assert_eq!(p.store().reads(), 1);
    }

    #[test]
    fn test_failed_read_leaves_cache_untouched() {
        let p = prefetcher(4);
        p.store().fail_reads(2);
        assert_eq!(p.prefetch_block(2), PrefetchStatus::Failed);
        assert!(!p.cache().contains(2));
        // Out-of-range ids fail the same way.
        assert_eq!(p.prefetch_block(99), PrefetchStatus::Failed);
    }

    #[test]
    fn test_prefetch_many_summary() {
        let p = prefetcher(4);
        p.prefetch_block(0);
        p.store().fail_reads(2);

        let summary = p.prefetch_many(&[0, 1, 2]);
        assert_eq!(
            summary,
            PrefetchSummary {
                prefetched: 1,
                skipped: 1,
                failed: 1,
            }
        );
        assert_eq!(summary.attempted(), 3);
    }
}
