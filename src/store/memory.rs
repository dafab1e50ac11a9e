//! In-memory block store with declared per-block column statistics.
//!
//! Reads return a shared [`MemoryBlock`] handle. Reads can be made to fail
//! per block, and every attempt is counted, which makes the store useful for
//! exercising the cache and prefetch paths without a file.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::catalog::block::BlockId;
use crate::catalog::stats::ColumnStats;
use crate::store::{BlockMetadata, BlockStore, ColumnChunkMeta, StoreError};

/// One in-memory block: a row count and per-column statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryBlock {
    pub block_id: BlockId,
    pub row_count: u64,
    pub columns: Vec<(String, Option<ColumnStats>)>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    blocks: Vec<Arc<MemoryBlock>>,
    failing: Mutex<HashSet<BlockId>>,
    reads: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single-column store where block `i` covers `ranges[i]` (inclusive).
    pub fn from_ranges(column: &str, ranges: &[(i64, i64)], rows_per_block: u64) -> Self {
        let mut store = Self::new();
        for &(min, max) in ranges {
            store.push_block(rows_per_block, vec![(column.to_string(), Some(ColumnStats::new(min, max)))]);
        }
        store
    }

    /// Append a block and return its id.
    pub fn push_block(
        &mut self,
        row_count: u64,
        columns: Vec<(String, Option<ColumnStats>)>,
    ) -> BlockId {
        let block_id = self.blocks.len() as BlockId;
        self.blocks.push(Arc::new(MemoryBlock {
            block_id,
            row_count,
            columns,
        }));
        block_id
    }

    /// Make every subsequent read of `block_id` fail.
    pub fn fail_reads(&self, block_id: BlockId) {
        self.failing.lock().insert(block_id);
    }

    /// Number of `read_block` calls so far, successful or not.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }
}

impl BlockStore for MemoryStore {
    type Payload = Arc<MemoryBlock>;

    fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    fn block_metadata(&self, block_id: BlockId) -> Option<BlockMetadata> {
        let block = self.blocks.get(block_id as usize)?;
        let columns = block
            .columns
            .iter()
            .map(|(name, stats)| ColumnChunkMeta {
                name: name.clone(),
                byte_offset: 0,
                byte_length: block.row_count * 8,
                compression: "UNCOMPRESSED".to_string(),
                stats: stats.clone(),
            })
            .collect();
        Some(BlockMetadata {
            row_count: block.row_count,
            columns,
        })
    }

    fn read_block(&self, block_id: BlockId) -> Result<Arc<MemoryBlock>, StoreError> {
        self.reads.fetch_add(1, Ordering::Relaxed);

        if self.failing.lock().contains(&block_id) {
            return Err(StoreError::ReadFailed {
                block_id,
                reason: "read failure injected".to_string(),
            });
        }

        self.blocks
            .get(block_id as usize)
            .cloned()
            .ok_or(StoreError::UnknownBlock {
                block_id,
                num_blocks: self.blocks.len(),
            })
    }
}
