//! Block cache.
//!
//! - [`block_cache`]: bounded LRU map from block id to materialized payload

pub mod block_cache;

pub use block_cache::{BlockCache, CacheStats, SharedBlockCache};
