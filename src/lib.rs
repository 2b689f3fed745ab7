//! hashledger - a minimal proof-of-work ledger
//!
//! This library implements a single-node, append-only chain with:
//! - SHA-256 proof-of-work sealing with optional multi-threaded nonce search
//! - A sled-backed block store with atomic tip updates
//! - UTXO accounting derived by scanning the chain
//! - A small command line interface

pub mod core;
pub mod crypto;
pub mod mining;
pub mod storage;
pub mod cli;
pub mod error;
pub mod config;

pub use error::{LedgerError, Result};
