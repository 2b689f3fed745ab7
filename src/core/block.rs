use crate::core::Transaction;
use crate::crypto::hash::Hash256;
use crate::mining::ProofOfWork;
use crate::Result;
use serde::{Deserialize, Serialize};

/// A sealed block. Only ever constructed through proof-of-work (or decoded
/// from storage), so `hash` and `nonce` are always populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub hash: Hash256,
    pub transactions: Vec<Transaction>,
    /// `None` exactly for the genesis block.
    pub prev_hash: Option<Hash256>,
    pub nonce: u64,
}

impl Block {
    /// Seals `transactions` on top of `prev_hash`.
    pub fn new(
        transactions: Vec<Transaction>,
        prev_hash: Option<Hash256>,
        pow: &ProofOfWork,
    ) -> Result<Self> {
        let (nonce, hash) = pow.run(prev_hash.as_ref(), &transactions)?;

        Ok(Self {
            hash,
            transactions,
            prev_hash,
            nonce,
        })
    }

    pub fn genesis(coinbase: Transaction, pow: &ProofOfWork) -> Result<Self> {
        Self::new(vec![coinbase], None, pow)
    }

    pub fn is_genesis(&self) -> bool {
        self.prev_hash.is_none()
    }

    /// Canonical encoding of a transaction list, as fed to the block digest.
    pub fn encode_transactions(transactions: &[Transaction]) -> Result<Vec<u8>> {
        Ok(bincode::serialize(transactions)?)
    }

    /// Storage representation.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(data)?)
    }

    pub fn get_coinbase_transaction(&self) -> Option<&Transaction> {
        self.transactions.first().filter(|tx| tx.is_coinbase())
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    pub fn contains_transaction(&self, txid: &Hash256) -> bool {
        self.transactions.iter().any(|tx| &tx.id == txid)
    }
}
