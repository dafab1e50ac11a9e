//! Block stores: the read-only source of truth behind the cache.
//!
//! - [`parquet_file`]: row groups of a Parquet file, materialized as Arrow batches
//! - [`memory`]: in-memory blocks with declared statistics

pub mod memory;
pub mod parquet_file;

use thiserror::Error;

use crate::catalog::block::BlockId;
use crate::catalog::stats::ColumnStats;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] ::parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Block {block_id} out of range (store has {num_blocks} blocks)")]
    UnknownBlock { block_id: BlockId, num_blocks: usize },

    #[error("Failed to read block {block_id}: {reason}")]
    ReadFailed { block_id: BlockId, reason: String },
}

/// Footer-level description of one column chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnChunkMeta {
    pub name: String,
    pub byte_offset: u64,
    pub byte_length: u64,
    pub compression: String,
    pub stats: Option<ColumnStats>,
}

/// Footer-level description of one block.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockMetadata {
    pub row_count: u64,
    pub columns: Vec<ColumnChunkMeta>,
}

/// A read-only columnar store partitioned into dense blocks `0..num_blocks`.
pub trait BlockStore: Send + Sync {
    /// Materialized block handle held by the cache.
    type Payload: Clone + Send + Sync + 'static;

    fn num_blocks(&self) -> usize;

    /// Layout and statistics of a block, `None` if the id is out of range.
    fn block_metadata(&self, block_id: BlockId) -> Option<BlockMetadata>;

    /// Statistics of one column of one block.
    fn stats(&self, block_id: BlockId, column: &str) -> Option<ColumnStats> {
        self.block_metadata(block_id)?
            .columns
            .into_iter()
            .find(|c| c.name == column)?
            .stats
    }

    /// Materialize the rows of a block.
    fn read_block(&self, block_id: BlockId) -> Result<Self::Payload, StoreError>;

    /// Materialize every block in id order.
    fn read_all(&self) -> Result<Vec<Self::Payload>, StoreError> {
        (0..self.num_blocks() as BlockId)
            .map(|block_id| self.read_block(block_id))
            .collect()
    }
}
