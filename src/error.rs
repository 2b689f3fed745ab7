use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Blockchain already exists")]
    AlreadyExists,

    #[error("No blockchain found, create one first")]
    NotFound,

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Nonce search space exhausted at difficulty {difficulty} (max nonce {max_nonce})")]
    ExhaustedSearchSpace { difficulty: u32, max_nonce: u64 },

    #[error("Corrupt block {hash}: {reason}")]
    CorruptBlock { hash: String, reason: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl LedgerError {
    pub fn corrupt_block(hash: impl ToString, reason: impl Into<String>) -> Self {
        LedgerError::CorruptBlock {
            hash: hash.to_string(),
            reason: reason.into(),
        }
    }
}
