//! Zone-map block pruning.
//!
//! - [`predicate`]: predicate tree and SQL WHERE-clause extraction
//! - [`eval`]: per-block evaluation against min/max statistics
//!
//! Pruning is sound: a block that could hold a matching row is never
//! excluded. False positives are allowed.

pub mod eval;
pub mod predicate;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::block::BlockId;
use crate::catalog::Catalog;
use crate::prune::predicate::Predicate;

/// What to return when pruning excludes every block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyResultPolicy {
    /// Return no candidates. Sound pruning proves no block can match.
    #[default]
    Empty,
    /// Widen to a scan of every block.
    FullScan,
}

/// The single pruning entry point used by the query path.
#[derive(Debug, Clone, Default)]
pub struct Pruner {
    empty_result: EmptyResultPolicy,
}

impl Pruner {
    pub fn new(empty_result: EmptyResultPolicy) -> Self {
        Self { empty_result }
    }

    pub fn empty_result_policy(&self) -> EmptyResultPolicy {
        self.empty_result
    }

    /// Candidate blocks for `predicate`, ascending. With no predicate every
    /// block is a candidate.
    pub fn prune(&self, catalog: &Catalog, table_id: &str, predicate: Option<&Predicate>) -> Vec<BlockId> {
        let all = catalog.block_ids();
        let Some(predicate) = predicate else {
            return all;
        };

        let candidates: Vec<BlockId> = all
            .iter()
            .copied()
            .filter(|&block_id| {
                let stats = catalog.stats_for_block(table_id, block_id);
                eval::may_match(predicate, &stats)
            })
            .collect();

        debug!(
            total = all.len(),
            candidates = candidates.len(),
            "Pruned blocks"
        );

        if candidates.is_empty() && self.empty_result == EmptyResultPolicy::FullScan {
            debug!("Pruning excluded every block, widening to full scan");
            return all;
        }
        candidates
    }

    /// Candidate blocks for the WHERE clause of `sql`. A statement that cannot
    /// be parsed scans every block.
    pub fn prune_sql(&self, catalog: &Catalog, table_id: &str, sql: &str) -> Vec<BlockId> {
        match Predicate::from_sql(sql) {
            Ok(predicate) => self.prune(catalog, table_id, predicate.as_ref()),
            Err(e) => {
                warn!(error = %e, "Could not extract predicate, scanning all blocks");
                catalog.block_ids()
            }
        }
    }
}
