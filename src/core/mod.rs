//! Ledger engine: blocks, transactions, the chain store and UTXO queries

pub mod blockchain;
pub mod block;
pub mod transaction;
pub mod utxo;

pub use blockchain::{Blockchain, BlockchainIterator};
pub use block::Block;
pub use transaction::{OutPoint, Transaction, TxInput, TxOutput};
pub use utxo::{SpendableSelection, UtxoEntry, UtxoSource};
