//! Rolling window of recently accessed block ids, shared by every query.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::catalog::block::BlockId;
use crate::config::ConfigError;

/// Fixed-capacity ring buffer; the oldest id is dropped when full.
pub struct GlobalHistory {
    entries: Mutex<VecDeque<BlockId>>,
    capacity: usize,
}

impl GlobalHistory {
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::Invalid(
                "global history capacity must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        })
    }

    pub fn record(&self, block_id: BlockId) {
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(block_id);
    }

    /// Record several ids under one lock, in order.
    pub fn record_all(&self, block_ids: &[BlockId]) {
        let mut entries = self.entries.lock();
        for &block_id in block_ids {
            if entries.len() == self.capacity {
                entries.pop_front();
            }
            entries.push_back(block_id);
        }
    }

    /// The last `length` ids (all of them when `None` or longer than the
    /// history), oldest first.
    pub fn get_sequence(&self, length: Option<usize>) -> Vec<BlockId> {
        let entries = self.entries.lock();
        let skip = match length {
            Some(n) if n < entries.len() => entries.len() - n,
            _ => 0,
        };
        entries.iter().skip(skip).copied().collect()
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
}
