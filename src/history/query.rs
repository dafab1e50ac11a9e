//! Per-query access history.

use std::collections::{HashMap, VecDeque};

use crate::catalog::block::BlockId;

/// Ordered block ids per query id, each capped at `max_history` with the
/// oldest entries dropped first.
///
/// Not synchronized; the owner wraps it in a lock.
#[derive(Debug, Clone)]
pub struct QueryHistory {
    queries: HashMap<String, VecDeque<BlockId>>,
    max_history: usize,
}

impl QueryHistory {
    pub fn new(max_history: usize) -> Self {
        Self {
            queries: HashMap::new(),
            max_history,
        }
    }

    pub fn push(&mut self, query_id: &str, block_id: BlockId) {
        let history = self.queries.entry(query_id.to_string()).or_default();
        history.push_back(block_id);
        while history.len() > self.max_history {
            history.pop_front();
        }
    }

    /// The query's history, oldest first. Empty for unknown queries.
    pub fn get(&self, query_id: &str) -> Vec<BlockId> {
        self.queries
            .get(query_id)
            .map(|h| h.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn remove(&mut self, query_id: &str) {
        self.queries.remove(query_id);
    }

    pub fn num_queries(&self) -> usize {
        self.queries.len()
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncates_from_front() {
        let mut history = QueryHistory::new(3);
        for id in 1..=5 {
            history.push("q", id);
        }
        assert_eq!(history.get("q"), vec![3, 4, 5]);
    }

    #[test]
    fn test_queries_are_independent() {
        let mut history = QueryHistory::new(4);
        history.push("a", 1);
        history.push("b", 2);
        history.push("a", 3);

        assert_eq!(history.get("a"), vec![1, 3]);
        assert_eq!(history.get("b"), vec![2]);
        assert!(history.get("c").is_empty());
        assert_eq!(history.num_queries(), 2);

        history.remove("a");
        assert!(history.get("a").is_empty());
    }
}
