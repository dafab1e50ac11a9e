//! Query path: prune, record, then serve blocks from the cache or the store.
//!
//! ```text
//! sql ──► Pruner ──► candidates ──► catalog / access log / histories
//!                                       │
//!                        cache hit ◄────┴────► cache miss ──► store read ──► cache put
//! ```
//!
//! Query execution itself is pluggable through [`QueryExecutor`]; the engine
//! only decides which blocks the executor sees.

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};

use crate::cache::SharedBlockCache;
use crate::catalog::block::BlockId;
use crate::catalog::Catalog;
use crate::history::{AccessLogger, GlobalHistory};
use crate::prefetch::PrefetchScheduler;
use crate::prune::predicate::Predicate;
use crate::prune::Pruner;
use crate::store::BlockStore;

/// Runs a query over the blocks the engine selected.
///
/// `blocks` holds the loaded candidates in ascending block order and is to
/// be treated as one dataset; the executor owns the merge (see
/// [`ParquetStore`](crate::store::parquet_file::ParquetStore), which
/// concatenates row groups into a single batch).
pub trait QueryExecutor<P> {
    type Output;
    type Error;

    fn execute(&self, blocks: &[P], sql: &str) -> Result<Self::Output, Self::Error>;
}

/// Blocks touched by one query.
#[derive(Debug, Clone)]
pub struct QueryScan<P> {
    /// Blocks left after pruning, ascending.
    pub candidates: Vec<BlockId>,
    /// Loaded blocks in candidate order.
    pub blocks: Vec<(BlockId, P)>,
    pub cache_hits: Vec<BlockId>,
    pub cache_misses: Vec<BlockId>,
    /// Misses whose store read failed.
    pub unavailable: Vec<BlockId>,
}

impl<P: Clone> QueryScan<P> {
    pub fn payloads(&self) -> Vec<P> {
        self.blocks.iter().map(|(_, p)| p.clone()).collect()
    }
}

pub struct StorageEngine<S: BlockStore> {
    table_id: String,
    store: Arc<S>,
    catalog: RwLock<Catalog>,
    pruner: Pruner,
    cache: Option<SharedBlockCache<S::Payload>>,
    history: Option<Arc<GlobalHistory>>,
    access_log: Option<Arc<AccessLogger>>,
    scheduler: Option<Arc<PrefetchScheduler>>,
}

impl<S: BlockStore> StorageEngine<S> {
    /// Build the catalog for `store` and serve it without cache or history.
    pub fn new(table_id: impl Into<String>, store: Arc<S>) -> Self {
        let table_id = table_id.into();
        let catalog = Catalog::build(table_id.clone(), store.as_ref());
        Self {
            table_id,
            store,
            catalog: RwLock::new(catalog),
            pruner: Pruner::default(),
            cache: None,
            history: None,
            access_log: None,
            scheduler: None,
        }
    }

    pub fn with_pruner(mut self, pruner: Pruner) -> Self {
        self.pruner = pruner;
        self
    }

    pub fn with_cache(mut self, cache: SharedBlockCache<S::Payload>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_history(mut self, history: Arc<GlobalHistory>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_access_log(mut self, access_log: Arc<AccessLogger>) -> Self {
        self.access_log = Some(access_log);
        self
    }

    pub fn with_scheduler(mut self, scheduler: Arc<PrefetchScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn table_id(&self) -> &str {
        &self.table_id
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn catalog(&self) -> RwLockReadGuard<'_, Catalog> {
        self.catalog.read()
    }

    pub fn cache(&self) -> Option<&SharedBlockCache<S::Payload>> {
        self.cache.as_ref()
    }

    /// Blocks that may satisfy `sql`'s WHERE clause.
    pub fn candidate_blocks(&self, sql: &str) -> Vec<BlockId> {
        self.pruner.prune_sql(&self.catalog.read(), &self.table_id, sql)
    }

    /// Prune by `sql` and load the surviving blocks.
    pub fn query(&self, query_id: &str, sql: &str) -> QueryScan<S::Payload> {
        let candidates = self.candidate_blocks(sql);
        self.scan(query_id, candidates)
    }

    /// Prune by an already-lowered predicate and load the surviving blocks.
    pub fn query_predicate(
        &self,
        query_id: &str,
        predicate: Option<&Predicate>,
    ) -> QueryScan<S::Payload> {
        let candidates = self
            .pruner
            .prune(&self.catalog.read(), &self.table_id, predicate);
        self.scan(query_id, candidates)
    }

    /// Record the access of `candidates` and load them, cache first.
    ///
    /// Misses are read from the store and inserted into the cache. Failed
    /// reads are reported in [`QueryScan::unavailable`] and do not fail the
    /// query.
    pub fn scan(&self, query_id: &str, candidates: Vec<BlockId>) -> QueryScan<S::Payload> {
        self.record_access(query_id, &candidates);

        let mut scan = QueryScan {
            candidates,
            blocks: Vec::new(),
            cache_hits: Vec::new(),
            cache_misses: Vec::new(),
            unavailable: Vec::new(),
        };

        for &block_id in &scan.candidates {
            if let Some(payload) = self.cache.as_ref().and_then(|c| c.get(block_id)) {
                scan.cache_hits.push(block_id);
                scan.blocks.push((block_id, payload));
                continue;
            }

            scan.cache_misses.push(block_id);
            match self.store.read_block(block_id) {
                Ok(payload) => {
                    if let Some(cache) = &self.cache {
                        cache.put(block_id, payload.clone());
                    }
                    scan.blocks.push((block_id, payload));
                }
                Err(e) => {
                    warn!(block_id, error = %e, "Block read failed");
                    scan.unavailable.push(block_id);
                }
            }
        }

        info!(
            query_id,
            candidates = scan.candidates.len(),
            hits = scan.cache_hits.len(),
            misses = scan.cache_misses.len(),
            unavailable = scan.unavailable.len(),
            "Scanned blocks"
        );
        scan
    }

    /// Scan for `sql`, then hand the loaded blocks to `executor`.
    pub fn execute<E>(
        &self,
        query_id: &str,
        sql: &str,
        executor: &E,
    ) -> Result<(QueryScan<S::Payload>, E::Output), E::Error>
    where
        E: QueryExecutor<S::Payload>,
    {
        let scan = self.query(query_id, sql);
        let output = executor.execute(&scan.payloads(), sql)?;
        Ok((scan, output))
    }

    fn record_access(&self, query_id: &str, blocks: &[BlockId]) {
        if blocks.is_empty() {
            return;
        }

        {
            let mut catalog = self.catalog.write();
            for &block_id in blocks {
                catalog.mark_access(block_id);
            }
        }

        if let Some(log) = &self.access_log {
            if let Err(e) = log.log(query_id, blocks) {
                warn!(query_id, error = %e, "Failed to persist access log");
            }
        }
        if let Some(history) = &self.history {
            history.record_all(blocks);
        }
        if let Some(scheduler) = &self.scheduler {
            for &block_id in blocks {
                scheduler.register_access(query_id, block_id);
            }
        }
        debug!(query_id, blocks = blocks.len(), "Recorded block access");
    }
}
