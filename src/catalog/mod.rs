//! Block statistics catalog.
//!
//! - [`stats`]: typed min/max/null-count values
//! - [`block`]: per (block, column) descriptors and usage counters
//!
//! The [`Catalog`] is built once from store metadata and never loses a
//! descriptor while it is alive. Lookups for an unknown table, column or block
//! return empty results rather than errors.

pub mod block;
pub mod stats;

use std::collections::HashMap;
use std::time::Instant;

use tracing::{debug, info};

use crate::catalog::block::{BlockId, BlockUsage, ChunkLocation, ColumnChunkDescriptor};
use crate::catalog::stats::ColumnStats;
use crate::store::BlockStore;

/// Statistics catalog for one table.
#[derive(Debug, Clone)]
pub struct Catalog {
    table_id: String,

    /// Flat list of descriptors, block-major.
    descriptors: Vec<ColumnChunkDescriptor>,

    /// Column name → descriptor indices, in block order.
    by_column: HashMap<String, Vec<usize>>,

    /// Block id → (column name → descriptor index). Dense: index == block id.
    by_block: Vec<HashMap<String, usize>>,
}

impl Catalog {
    /// Create an empty catalog for `table_id`.
    pub fn new(table_id: impl Into<String>) -> Self {
        Self {
            table_id: table_id.into(),
            descriptors: Vec::new(),
            by_column: HashMap::new(),
            by_block: Vec::new(),
        }
    }

    /// Build the catalog from a store's footer metadata.
    ///
    /// Every block and every column of the block gets a descriptor; row
    /// ranges are derived from the running row count.
    pub fn build<S: BlockStore + ?Sized>(table_id: impl Into<String>, store: &S) -> Self {
        let mut catalog = Self::new(table_id);
        let mut row_start = 0u64;

        for block_id in 0..store.num_blocks() as BlockId {
            // Keep ids dense even if the store cannot describe a block.
            catalog.by_block.push(HashMap::new());

            let Some(meta) = store.block_metadata(block_id) else {
                debug!(block_id, "Store reported no metadata for block");
                continue;
            };

            let row_end = row_start + meta.row_count.saturating_sub(1);
            for (column_index, column) in meta.columns.into_iter().enumerate() {
                let location = ChunkLocation {
                    row_start,
                    row_end,
                    byte_offset: column.byte_offset,
                    byte_length: column.byte_length,
                    compression: column.compression,
                };
                catalog.insert(ColumnChunkDescriptor::new(
                    catalog.table_id.clone(),
                    block_id,
                    column.name,
                    column_index,
                    location,
                    column.stats,
                ));
            }
            row_start += meta.row_count;
        }

        info!(
            table = %catalog.table_id,
            blocks = catalog.num_blocks(),
            descriptors = catalog.descriptors.len(),
            rows = row_start,
            "Built block catalog"
        );

        catalog
    }

    fn insert(&mut self, descriptor: ColumnChunkDescriptor) {
        let idx = self.descriptors.len();
        let block_idx = descriptor.block_id as usize;
        if self.by_block.len() <= block_idx {
            self.by_block.resize_with(block_idx + 1, HashMap::new);
        }
        self.by_block[block_idx].insert(descriptor.column_name.clone(), idx);
        self.by_column
            .entry(descriptor.column_name.clone())
            .or_default()
            .push(idx);
        self.descriptors.push(descriptor);
    }

    pub fn table_id(&self) -> &str {
        &self.table_id
    }

    pub fn num_blocks(&self) -> usize {
        self.by_block.len()
    }

    /// All block ids, ascending.
    pub fn block_ids(&self) -> Vec<BlockId> {
        (0..self.num_blocks() as BlockId).collect()
    }

    /// Flat list of every descriptor.
    pub fn descriptors(&self) -> &[ColumnChunkDescriptor] {
        &self.descriptors
    }

    /// Descriptors of one column across all blocks, in block order.
    pub fn by_column(&self, table_id: &str, column: &str) -> Vec<&ColumnChunkDescriptor> {
        if table_id != self.table_id {
            return Vec::new();
        }
        self.by_column
            .get(column)
            .map(|indices| indices.iter().map(|&i| &self.descriptors[i]).collect())
            .unwrap_or_default()
    }

    /// Column name → statistics for one block. Columns without statistics
    /// are omitted; unknown tables or blocks yield an empty map.
    pub fn stats_for_block(&self, table_id: &str, block_id: BlockId) -> HashMap<String, ColumnStats> {
        if table_id != self.table_id {
            return HashMap::new();
        }
        let Some(columns) = self.by_block.get(block_id as usize) else {
            return HashMap::new();
        };
        columns
            .iter()
            .filter_map(|(name, &idx)| {
                let stats = self.descriptors[idx].stats.clone()?;
                Some((name.clone(), stats))
            })
            .collect()
    }

    /// Record an access to every column descriptor of `block_id`.
    /// Unknown blocks are ignored.
    pub fn mark_access(&mut self, block_id: BlockId) {
        let Some(columns) = self.by_block.get(block_id as usize) else {
            return;
        };
        let now = Instant::now();
        for &idx in columns.values() {
            self.descriptors[idx].mark_access(now);
        }
    }

    /// Usage counters of a block, taken from its first column descriptor
    /// (all columns of a block are marked together).
    pub fn block_usage(&self, block_id: BlockId) -> Option<BlockUsage> {
        let columns = self.by_block.get(block_id as usize)?;
        let idx = *columns.values().min()?;
        let desc = &self.descriptors[idx];
        Some(BlockUsage {
            access_count: desc.access_count,
            last_access: desc.last_access,
            ewma_usage: desc.ewma_usage,
        })
    }
}
