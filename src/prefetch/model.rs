//! Sequence models that score the next block access.

use std::collections::HashMap;

use crate::catalog::block::BlockId;
use crate::prefetch::mapping::{PredictionMapping, Token, UNKNOWN_TOKEN};

/// A predictive model over a fixed token vocabulary.
pub trait SequenceModel: Send + Sync {
    /// Number of tokens the model scores, including token 0.
    fn vocab_size(&self) -> usize;

    /// Confidence in `[0, 1]` for every vocabulary token being accessed next,
    /// given the recent token sequence (oldest first).
    fn predict(&self, tokens: &[Token]) -> Vec<f32>;
}

/// First-order transition model: the confidence of token `b` after token `a`
/// is the fraction of `a`'s observed successors that were `b`.
#[derive(Debug, Clone)]
pub struct TransitionModel {
    vocab_size: usize,
    transitions: HashMap<Token, HashMap<Token, u32>>,
}

impl TransitionModel {
    /// Count transitions between consecutive known blocks of `sequence`.
    pub fn fit(mapping: &PredictionMapping, sequence: &[BlockId]) -> Self {
        let mut transitions: HashMap<Token, HashMap<Token, u32>> = HashMap::new();
        let tokens: Vec<Token> = sequence
            .iter()
            .map(|&b| mapping.token_for(b))
            .filter(|&t| t != UNKNOWN_TOKEN)
            .collect();

        for pair in tokens.windows(2) {
            *transitions
                .entry(pair[0])
                .or_default()
                .entry(pair[1])
                .or_default() += 1;
        }

        Self {
            vocab_size: mapping.vocab_size(),
            transitions,
        }
    }
}

impl SequenceModel for TransitionModel {
    fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn predict(&self, tokens: &[Token]) -> Vec<f32> {
        let mut scores = vec![0.0; self.vocab_size];
        let Some(successors) = tokens.last().and_then(|t| self.transitions.get(t)) else {
            return scores;
        };

        let total: u32 = successors.values().sum();
        for (&next, &count) in successors {
            if let Some(score) = scores.get_mut(next as usize) {
                *score = count as f32 / total as f32;
            }
        }
        scores
    }
}
