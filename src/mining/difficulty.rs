use crate::crypto::hash::Hash256;
use crate::{LedgerError, Result};

/// Largest difficulty whose target still fits in 256 bits (target = 1).
pub const MAX_DIFFICULTY: u32 = 256;

/// Reference difficulty: a hash must have its top 5 bits clear.
pub const DEFAULT_DIFFICULTY: u32 = 5;

/// The admission threshold `2^(256 - difficulty)` for a fixed difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DifficultyTarget {
    difficulty: u32,
    // None when difficulty is 0: the target is 2^256 and every hash passes.
    target_hash: Option<[u8; 32]>,
}

impl DifficultyTarget {
    pub fn new(difficulty: u32) -> Result<Self> {
        if difficulty > MAX_DIFFICULTY {
            return Err(LedgerError::InvalidInput(format!(
                "difficulty {} exceeds maximum {}",
                difficulty, MAX_DIFFICULTY
            )));
        }

        Ok(Self {
            difficulty,
            target_hash: Self::difficulty_to_target(difficulty),
        })
    }

    /// Big-endian bytes of `2^(256 - difficulty)` with a single bit set.
    fn difficulty_to_target(difficulty: u32) -> Option<[u8; 32]> {
        if difficulty == 0 {
            return None;
        }

        let bit = (MAX_DIFFICULTY - difficulty) as usize;
        let mut target_hash = [0u8; 32];
        target_hash[31 - bit / 8] = 1u8 << (bit % 8);
        Some(target_hash)
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn target_hash(&self) -> Option<&[u8; 32]> {
        self.target_hash.as_ref()
    }

    /// True iff `hash`, read as an unsigned 256-bit integer, is strictly below the target.
    pub fn is_met_by(&self, hash: &Hash256) -> bool {
        match &self.target_hash {
            Some(target) => hash.as_bytes() < target,
            None => true,
        }
    }

    /// Expected number of hash evaluations to find a satisfying nonce.
    pub fn expected_attempts(&self) -> f64 {
        2f64.powi(self.difficulty as i32)
    }
}
