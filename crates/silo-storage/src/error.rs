//! Storage error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Value for key '{key}' exceeds tier quota ({size} > {limit} bytes)")]
    QuotaExceeded {
        key: String,
        size: usize,
        limit: usize,
    },

    #[error("Storage tier unavailable: {0}")]
    Unavailable(String),
}
