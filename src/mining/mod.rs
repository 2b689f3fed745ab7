//! Proof-of-work admission rule

pub mod difficulty;
pub mod pow;

pub use difficulty::{DifficultyTarget, DEFAULT_DIFFICULTY, MAX_DIFFICULTY};
pub use pow::ProofOfWork;
