//! microblock-prefetch: statistics-driven block pruning, an LRU block cache
//! and a predictive background prefetcher for columnar files.
//!
//! A query flows through the [`prune`] layer (zone-map pruning over the
//! [`catalog`] statistics), consults the [`cache`], and reads the remaining
//! blocks from a [`store`]. Every touched block is recorded in the
//! [`history`] so the [`prefetch`] service can warm the cache ahead of the
//! next query.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod history;
pub mod prefetch;
pub mod prune;
pub mod store;

pub use catalog::block::BlockId;
pub use prefetch::mapping::Token;

/// Query identity used by the background service and by callers that do not
/// track individual queries.
pub const GLOBAL_QUERY_ID: &str = "GLOBAL";
