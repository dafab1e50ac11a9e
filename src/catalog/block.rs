//! Block descriptors: one per (block, column) chunk of the store.
//!
//! Location fields are fixed when the catalog is built. Usage counters change
//! only through [`ColumnChunkDescriptor::mark_access`].

use std::time::Instant;

use crate::catalog::stats::ColumnStats;

/// Dense block identifier, `0..num_blocks`, 1:1 with a physical partition
/// (row group) of the underlying store.
pub type BlockId = u64;

/// Smoothing factor for the usage EWMA.
pub const EWMA_ALPHA: f64 = 0.2;

/// Physical layout of one column chunk inside a block.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkLocation {
    /// First row of the block (inclusive).
    pub row_start: u64,
    /// Last row of the block (inclusive). Equal to `row_start` for an empty
    /// block.
    pub row_end: u64,
    /// Offset of the chunk in the file.
    pub byte_offset: u64,
    /// Compressed chunk length in bytes.
    pub byte_length: u64,
    /// Codec name as reported by the store.
    pub compression: String,
}

/// Statistics, location and usage counters for one column of one block.
#[derive(Debug, Clone)]
pub struct ColumnChunkDescriptor {
    pub table_id: String,
    pub block_id: BlockId,
    pub column_name: String,
    pub column_index: usize,

    pub location: ChunkLocation,

    /// `None` when the store reports no statistics for this chunk.
    pub stats: Option<ColumnStats>,

    pub access_count: u64,
    pub last_access: Option<Instant>,
    pub ewma_usage: f64,
}

impl ColumnChunkDescriptor {
    pub fn new(
        table_id: impl Into<String>,
        block_id: BlockId,
        column_name: impl Into<String>,
        column_index: usize,
        location: ChunkLocation,
        stats: Option<ColumnStats>,
    ) -> Self {
        Self {
            table_id: table_id.into(),
            block_id,
            column_name: column_name.into(),
            column_index,
            location,
            stats,
            access_count: 0,
            last_access: None,
            ewma_usage: 0.0,
        }
    }

    /// Record an access: bump the counter, stamp the time and fold a `1`
    /// into the usage EWMA.
    pub fn mark_access(&mut self, now: Instant) {
        self.access_count += 1;
        self.last_access = Some(now);
        self.ewma_usage = EWMA_ALPHA * 1.0 + (1.0 - EWMA_ALPHA) * self.ewma_usage;
    }
}

/// Aggregated usage of a whole block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockUsage {
    pub access_count: u64,
    pub last_access: Option<Instant>,
    pub ewma_usage: f64,
}
