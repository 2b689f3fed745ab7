//! Proof-of-work sealing and validation.
//!
//! A block digest is `SHA-256(prev_hash ∥ payload ∥ be64(nonce) ∥ be64(difficulty))`
//! where `payload` is the encoded transaction list and `prev_hash` is empty
//! for the genesis block. Sealing looks for the smallest nonce whose digest is
//! below the [`DifficultyTarget`].

use crate::core::{Block, Transaction};
use crate::crypto::hash::Hash256;
use crate::mining::difficulty::DifficultyTarget;
use crate::{LedgerError, Result};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct ProofOfWork {
    target: DifficultyTarget,
    threads: usize,
    max_nonce: u64,
}

impl ProofOfWork {
    pub fn new(difficulty: u32, threads: usize) -> Result<Self> {
        Ok(Self {
            target: DifficultyTarget::new(difficulty)?,
            threads: threads.max(1),
            max_nonce: u64::MAX,
        })
    }

    /// Caps the nonce range searched by [`ProofOfWork::run`].
    pub fn with_max_nonce(mut self, max_nonce: u64) -> Self {
        self.max_nonce = max_nonce;
        self
    }

    pub fn difficulty(&self) -> u32 {
        self.target.difficulty()
    }

    pub fn target(&self) -> &DifficultyTarget {
        &self.target
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Hasher state after absorbing everything but the nonce and difficulty.
    fn midstate(prev_hash: Option<&Hash256>, payload: &[u8]) -> Sha256 {
        let mut hasher = Sha256::new();
        if let Some(prev_hash) = prev_hash {
            hasher.update(prev_hash.as_bytes());
        }
        hasher.update(payload);
        hasher
    }

    fn digest(&self, midstate: &Sha256, nonce: u64) -> Hash256 {
        let mut hasher = midstate.clone();
        hasher.update(nonce.to_be_bytes());
        hasher.update(u64::from(self.target.difficulty()).to_be_bytes());
        Hash256::new(hasher.finalize().into())
    }

    pub fn hash_with_nonce(
        &self,
        prev_hash: Option<&Hash256>,
        transactions: &[Transaction],
        nonce: u64,
    ) -> Result<Hash256> {
        let payload = Block::encode_transactions(transactions)?;
        Ok(self.digest(&Self::midstate(prev_hash, &payload), nonce))
    }

    /// Finds the smallest nonce whose digest meets the target.
    pub fn run(
        &self,
        prev_hash: Option<&Hash256>,
        transactions: &[Transaction],
    ) -> Result<(u64, Hash256)> {
        let payload = Block::encode_transactions(transactions)?;
        let midstate = Self::midstate(prev_hash, &payload);
        let start_time = Instant::now();
        log::debug!(
            "Sealing {} transaction(s) at difficulty {} (~{:.0} attempts expected)",
            transactions.len(),
            self.target.difficulty(),
            self.target.expected_attempts()
        );

        let nonce = self.search(&midstate).ok_or(LedgerError::ExhaustedSearchSpace {
            difficulty: self.target.difficulty(),
            max_nonce: self.max_nonce,
        })?;
        let hash = self.digest(&midstate, nonce);

        log::debug!(
            "⛏️  Sealed block {} with nonce {} in {:.2?} ({} threads)",
            hash.short(),
            nonce,
            start_time.elapsed(),
            self.threads
        );
        Ok((nonce, hash))
    }

    fn search(&self, midstate: &Sha256) -> Option<u64> {
        let workers = self.threads as u64;
        let best = AtomicU64::new(u64::MAX);
        let found = AtomicBool::new(false);

        if workers == 1 {
            self.search_stride(midstate, 0, 1, &best, &found);
        } else {
            thread::scope(|scope| {
                for start in 0..workers {
                    let (best, found) = (&best, &found);
                    scope.spawn(move || self.search_stride(midstate, start, workers, best, found));
                }
            });
        }

        if found.load(Ordering::Acquire) {
            Some(best.load(Ordering::Acquire))
        } else {
            None
        }
    }

    /// Tries `start, start + step, ...` until a hit, until another worker has
    /// a smaller hit, or until the nonce range is exhausted.
    fn search_stride(
        &self,
        midstate: &Sha256,
        start: u64,
        step: u64,
        best: &AtomicU64,
        found: &AtomicBool,
    ) {
        let mut nonce = start;
        while nonce <= self.max_nonce {
            if found.load(Ordering::Acquire) && nonce > best.load(Ordering::Acquire) {
                return;
            }

            if self.target.is_met_by(&self.digest(midstate, nonce)) {
                best.fetch_min(nonce, Ordering::AcqRel);
                found.store(true, Ordering::Release);
                return;
            }

            nonce = match nonce.checked_add(step) {
                Some(next) => next,
                None => return,
            };
        }
    }

    /// Recomputes the digest for the block's stored nonce. True iff it equals
    /// the stored hash and meets the target.
    pub fn validate(&self, block: &Block) -> bool {
        match self.hash_with_nonce(block.prev_hash.as_ref(), &block.transactions, block.nonce) {
            Ok(hash) => hash == block.hash && self.target.is_met_by(&hash),
            Err(e) => {
                log::warn!("Cannot encode block {} for validation: {}", block.hash.short(), e);
                false
            }
        }
    }
}
