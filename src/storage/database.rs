use crate::core::Block;
use crate::crypto::hash::Hash256;
use crate::{LedgerError, Result};
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
    TransactionResult,
};
use sled::Db;
use std::path::Path;
use std::sync::Arc;

/// Key holding the hash of the current tip. Every other key is a block hash.
pub const LAST_HASH_KEY: &[u8] = b"last_hash";

/// Owned handle to the chain's key-value store.
///
/// Blocks live under their 32-byte hash, the tip under [`LAST_HASH_KEY`].
/// Cloning shares the same underlying store.
#[derive(Debug, Clone)]
pub struct Database {
    db: Arc<Db>,
}

impl Database {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)
            .map_err(|e| LedgerError::Storage(format!("Failed to open database: {}", e)))?;

        Ok(Self {
            db: Arc::new(db),
        })
    }

    pub fn has_chain(&self) -> Result<bool> {
        self.db
            .contains_key(LAST_HASH_KEY)
            .map_err(|e| LedgerError::Storage(format!("Failed to read tip: {}", e)))
    }

    pub fn get_tip(&self) -> Result<Option<Hash256>> {
        let stored = self
            .db
            .get(LAST_HASH_KEY)
            .map_err(|e| LedgerError::Storage(format!("Failed to read tip: {}", e)))?;

        match stored {
            Some(bytes) => {
                let tip = Hash256::from_slice(&bytes)
                    .ok_or_else(|| LedgerError::Storage("Invalid tip hash length".to_string()))?;
                Ok(Some(tip))
            }
            None => Ok(None),
        }
    }

    /// Loads a block. Bytes that do not decode are reported as a corrupt block.
    pub fn get_block(&self, hash: &Hash256) -> Result<Option<Block>> {
        let stored = self
            .db
            .get(hash.as_bytes())
            .map_err(|e| LedgerError::Storage(format!("Failed to get block: {}", e)))?;

        match stored {
            Some(data) => {
                let block = Block::deserialize(&data)
                    .map_err(|e| LedgerError::corrupt_block(hash, format!("undecodable: {}", e)))?;
                Ok(Some(block))
            }
            None => Ok(None),
        }
    }

    /// Stores the genesis block and points the tip at it, unless a chain
    /// already exists. Check and writes happen in one store transaction.
    pub fn insert_genesis(&self, genesis: &Block) -> Result<()> {
        let encoded = genesis.serialize()?;
        let hash_key = &genesis.hash.as_bytes()[..];

        let outcome = self.db.transaction(|tx| -> ConflictableTransactionResult<(), LedgerError> {
            if tx.get(LAST_HASH_KEY)?.is_some() {
                return Err(ConflictableTransactionError::Abort(LedgerError::AlreadyExists));
            }
            tx.insert(hash_key, encoded.as_slice())?;
            tx.insert(LAST_HASH_KEY, hash_key)?;
            Ok(())
        });
        Self::map_transaction_error(outcome, "save genesis block")?;
        self.flush()?;

        log::debug!("💾 Saved genesis block {}", genesis.hash);
        Ok(())
    }

    /// Appends `block` if the tip is still `expected_tip`.
    ///
    /// The tip comparison, the block write and the tip update commit as one
    /// transaction. Returns `false`, having written nothing, when another
    /// writer moved the tip first.
    pub fn append_block(&self, expected_tip: &Hash256, block: &Block) -> Result<bool> {
        let encoded = block.serialize()?;
        let hash_key = &block.hash.as_bytes()[..];
        let expected = &expected_tip.as_bytes()[..];

        let outcome = self.db.transaction(|tx| -> ConflictableTransactionResult<bool, LedgerError> {
            let current = tx.get(LAST_HASH_KEY)?;
            if current.as_deref() != Some(expected) {
                return Ok(false);
            }
            tx.insert(hash_key, encoded.as_slice())?;
            tx.insert(LAST_HASH_KEY, hash_key)?;
            Ok(true)
        });
        let committed = Self::map_transaction_error(outcome, "append block")?;

        if committed {
            self.flush()?;
            log::debug!("💾 Saved block {} on top of {}", block.hash, expected_tip);
        }
        Ok(committed)
    }

    fn map_transaction_error<T>(
        outcome: TransactionResult<T, LedgerError>,
        action: &str,
    ) -> Result<T> {
        outcome.map_err(|e| match e {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => {
                LedgerError::Storage(format!("Failed to {}: {}", action, e))
            }
        })
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()
            .map_err(|e| LedgerError::Storage(format!("Failed to flush database: {}", e)))?;
        Ok(())
    }

    /// Flushes and releases this handle.
    pub fn close(self) -> Result<()> {
        self.flush()
    }
}
