//! Validated bidirectional block id ↔ model token table.
//!
//! Token 0 is reserved for padding / unknown blocks. Every other token maps
//! to exactly one block id and back, and every token is below `vocab_size`.
//! The table is immutable once built.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::catalog::block::BlockId;

/// Model vocabulary index.
pub type Token = u32;

/// Padding / unknown token.
pub const UNKNOWN_TOKEN: Token = 0;

#[derive(Error, Debug)]
pub enum MappingError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Token 0 is reserved but mapped to block {0}")]
    ReservedToken(BlockId),

    #[error("Token {token} (block {block_id}) is outside the vocabulary of size {vocab_size}")]
    TokenOutOfRange {
        token: Token,
        block_id: BlockId,
        vocab_size: usize,
    },

    #[error("Inconsistent mapping: {0}")]
    Inconsistent(String),
}

/// On-disk layout: `{"id2idx": {..}, "idx2id": {..}, "vocab_size": n}`.
#[derive(Debug, Serialize, Deserialize)]
struct MappingFile {
    id2idx: BTreeMap<BlockId, Token>,
    idx2id: BTreeMap<Token, BlockId>,
    #[serde(default)]
    vocab_size: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionMapping {
    id2idx: HashMap<BlockId, Token>,
    idx2id: HashMap<Token, BlockId>,
    vocab_size: usize,
}

impl PredictionMapping {
    /// Build a mapping, rejecting any inconsistency between the two
    /// directions or with `vocab_size`.
    pub fn new(
        id2idx: HashMap<BlockId, Token>,
        idx2id: HashMap<Token, BlockId>,
        vocab_size: usize,
    ) -> Result<Self, MappingError> {
        if id2idx.len() != idx2id.len() {
            return Err(MappingError::Inconsistent(format!(
                "id2idx has {} entries but idx2id has {}",
                id2idx.len(),
                idx2id.len()
            )));
        }
        for (&block_id, &token) in &id2idx {
            if token == UNKNOWN_TOKEN {
                return Err(MappingError::ReservedToken(block_id));
            }
            if token as usize >= vocab_size {
                return Err(MappingError::TokenOutOfRange {
                    token,
                    block_id,
                    vocab_size,
                });
            }
            // Equal sizes plus a round trip for every entry make the two maps
            // inverse bijections.
            if idx2id.get(&token) != Some(&block_id) {
                return Err(MappingError::Inconsistent(format!(
                    "block {block_id} maps to token {token}, which does not map back to it"
                )));
            }
        }

        Ok(Self {
            id2idx,
            idx2id,
            vocab_size,
        })
    }

    /// Vocabulary over the distinct ids of `blocks`: sorted ascending and
    /// numbered from 1, with `vocab_size = distinct + 1`.
    pub fn from_block_sequence(blocks: &[BlockId]) -> Self {
        let unique: BTreeSet<BlockId> = blocks.iter().copied().collect();
        let mut id2idx = HashMap::with_capacity(unique.len());
        let mut idx2id = HashMap::with_capacity(unique.len());
        for (i, block_id) in unique.into_iter().enumerate() {
            let token = (i + 1) as Token;
            id2idx.insert(block_id, token);
            idx2id.insert(token, block_id);
        }
        let vocab_size = id2idx.len() + 1;
        Self {
            id2idx,
            idx2id,
            vocab_size,
        }
    }

    /// Load and validate a persisted mapping. A missing `vocab_size` falls
    /// back to `max(token) + 1`.
    pub fn load(path: &Path) -> Result<Self, MappingError> {
        let data = std::fs::read(path)?;
        let file: MappingFile = serde_json::from_slice(&data)?;
        let vocab_size = file
            .vocab_size
            .unwrap_or_else(|| file.idx2id.keys().max().map_or(1, |&t| t as usize + 1));

        let mapping = Self::new(
            file.id2idx.into_iter().collect(),
            file.idx2id.into_iter().collect(),
            vocab_size,
        )?;
        info!(
            path = %path.display(),
            blocks = mapping.len(),
            vocab_size = mapping.vocab_size,
            "Loaded prediction mapping"
        );
        Ok(mapping)
    }

    pub fn save(&self, path: &Path) -> Result<(), MappingError> {
        let file = MappingFile {
            id2idx: self.id2idx.iter().map(|(&k, &v)| (k, v)).collect(),
            idx2id: self.idx2id.iter().map(|(&k, &v)| (k, v)).collect(),
            vocab_size: Some(self.vocab_size),
        };
        std::fs::write(path, serde_json::to_vec_pretty(&file)?)?;
        Ok(())
    }

    /// Token of a block, [`UNKNOWN_TOKEN`] if the block is not in the vocabulary.
    pub fn token_for(&self, block_id: BlockId) -> Token {
        self.id2idx.get(&block_id).copied().unwrap_or(UNKNOWN_TOKEN)
    }

    pub fn block_for(&self, token: Token) -> Option<BlockId> {
        self.idx2id.get(&token).copied()
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub fn max_token(&self) -> Option<Token> {
        self.idx2id.keys().max().copied()
    }

    /// Number of mapped blocks.
    pub fn len(&self) -> usize {
        self.id2idx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id2idx.is_empty()
    }
}
