//! Turns recent block accesses into ranked prefetch suggestions.
//!
//! The scheduler owns a [`SequenceModel`] and a [`PredictionMapping`] that
//! must agree on the vocabulary size; construction fails otherwise. It also
//! keeps a bounded history per query id so callers can ask for suggestions
//! without passing a sequence.

use std::collections::HashSet;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

use crate::catalog::block::BlockId;
use crate::config::{ConfigError, SchedulerConfig};
use crate::history::QueryHistory;
use crate::prefetch::mapping::{PredictionMapping, Token, UNKNOWN_TOKEN};
use crate::prefetch::model::SequenceModel;

/// Fewest known tokens the model is asked to predict from.
pub const MIN_CONTEXT_TOKENS: usize = 3;

/// Most recent accesses encoded into the model context.
pub const CONTEXT_WINDOW: usize = 64;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Model vocabulary ({model}) does not match the declared vocabulary ({declared})")]
    ModelVocabMismatch { model: usize, declared: usize },

    #[error("Mapping vocabulary ({mapping}) does not match the declared vocabulary ({declared})")]
    MappingVocabMismatch { mapping: usize, declared: usize },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A block predicted to be accessed soon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Suggestion {
    pub block_id: BlockId,
    pub confidence: f32,
}

pub struct PrefetchScheduler {
    model: Box<dyn SequenceModel>,
    mapping: PredictionMapping,
    vocab_size: usize,
    prefetch_threshold: f32,
    history: Mutex<QueryHistory>,
}

impl PrefetchScheduler {
    pub fn new(
        model: impl SequenceModel + 'static,
        mapping: PredictionMapping,
        vocab_size: usize,
        config: &SchedulerConfig,
    ) -> Result<Self, SchedulerError> {
        config.validate()?;

        if model.vocab_size() != vocab_size {
            return Err(SchedulerError::ModelVocabMismatch {
                model: model.vocab_size(),
                declared: vocab_size,
            });
        }
        // A validated mapping keeps every token below its own vocabulary size.
        if mapping.vocab_size() != vocab_size {
            return Err(SchedulerError::MappingVocabMismatch {
                mapping: mapping.vocab_size(),
                declared: vocab_size,
            });
        }

        Ok(Self {
            model: Box::new(model),
            mapping,
            vocab_size,
            prefetch_threshold: config.prefetch_threshold,
            history: Mutex::new(QueryHistory::new(config.max_history)),
        })
    }

    /// Append an access to the query's history.
    pub fn register_access(&self, query_id: &str, block_id: BlockId) {
        self.history.lock().push(query_id, block_id);
    }

    pub fn history_for(&self, query_id: &str) -> Vec<BlockId> {
        self.history.lock().get(query_id)
    }

    pub fn clear_history(&self, query_id: &str) {
        self.history.lock().remove(query_id);
    }

    pub fn mapping(&self) -> &PredictionMapping {
        &self.mapping
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub fn prefetch_threshold(&self) -> f32 {
        self.prefetch_threshold
    }

    /// Rank up to `k` blocks likely to be accessed next.
    ///
    /// Uses `sequence` when given, otherwise the query's own history. Only
    /// the `k` highest-scoring tokens are considered; of those, token 0,
    /// unmapped tokens and `exclude`d blocks are dropped. Returns `None` when
    /// the context has fewer than [`MIN_CONTEXT_TOKENS`] known blocks or
    /// nothing survives filtering.
    pub fn suggest_topk_prefetch(
        &self,
        query_id: &str,
        sequence: Option<&[BlockId]>,
        k: usize,
        exclude: Option<&HashSet<BlockId>>,
    ) -> Option<Vec<Suggestion>> {
        if k == 0 {
            return None;
        }

        let history = match sequence {
            Some(seq) => seq.to_vec(),
            None => self.history_for(query_id),
        };
        let tokens = self.encode(&history)?;

        let mut scores = self.model.predict(&tokens);
        if let Some(padding) = scores.first_mut() {
            *padding = f32::NEG_INFINITY;
        }

        let mut ranked: Vec<(Token, f32)> = scores
            .iter()
            .take(self.vocab_size)
            .enumerate()
            .map(|(token, &score)| {
                let score = if score.is_nan() { f32::NEG_INFINITY } else { score };
                (token as Token, score)
            })
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        let suggestions: Vec<Suggestion> = ranked
            .into_iter()
            .take(k)
            .filter(|&(token, _)| token != UNKNOWN_TOKEN)
            .filter_map(|(token, confidence)| {
                let block_id = self.mapping.block_for(token)?;
                Some(Suggestion {
                    block_id,
                    confidence,
                })
            })
            .filter(|s| !exclude.is_some_and(|ex| ex.contains(&s.block_id)))
            .collect();

        debug!(
            query_id,
            context = tokens.len(),
            suggestions = suggestions.len(),
            "Scored prefetch candidates"
        );

        if suggestions.is_empty() {
            None
        } else {
            Some(suggestions)
        }
    }

    /// The single best block, if its confidence reaches the threshold.
    pub fn suggest_next(&self, query_id: &str, sequence: Option<&[BlockId]>) -> Option<Suggestion> {
        self.suggest_topk_prefetch(query_id, sequence, 1, None)?
            .into_iter()
            .next()
            .filter(|s| s.confidence >= self.prefetch_threshold)
    }

    /// Map the most recent [`CONTEXT_WINDOW`] accesses to known tokens.
    fn encode(&self, history: &[BlockId]) -> Option<Vec<Token>> {
        let start = history.len().saturating_sub(CONTEXT_WINDOW);
        let tokens: Vec<Token> = history[start..]
            .iter()
            .map(|&b| self.mapping.token_for(b))
            .filter(|&t| t != UNKNOWN_TOKEN)
            .collect();

        if tokens.len() < MIN_CONTEXT_TOKENS {
            None
        } else {
            Some(tokens)
        }
    }
}
