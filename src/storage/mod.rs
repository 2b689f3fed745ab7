//! Persistent chain store

pub mod database;

pub use database::{Database, LAST_HASH_KEY};
