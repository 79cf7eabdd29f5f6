//! SILO Storage Layer
//!
//! Four durability tiers back the engine: in-memory state, a fast-volatile
//! store that lives until the whole browser closes, a size-limited durable
//! key-value store, and a durable record store that is authoritative for
//! bulk session+cookie data. This crate provides the tier contracts and
//! the SQLite-backed durable implementations.

mod database;
mod error;
mod kv;
mod memory;
mod migrations;
mod records;
mod tier;

pub use database::Database;
pub use error::StorageError;
pub use kv::SqliteKvStore;
pub use memory::MemoryStore;
pub use records::SqliteRecordStore;
pub use tier::{RecordStore, StorageTier};

pub type Result<T> = std::result::Result<T, StorageError>;
