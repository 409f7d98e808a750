//! Error types for shardkv
//!
//! Provides a unified error type for all operations.
//!
//! A missing key is never an error: lookups return `Option`. Undecryptable or
//! malformed shard payloads are downgraded to empty shards by the storage layer
//! (logged with `tracing::warn!`), so callers needing strict durability should
//! watch the logs or the event stream.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using ShardError
pub type Result<T> = std::result::Result<T, ShardError>;

/// Unified error type for shardkv operations
#[derive(Debug, Error)]
pub enum ShardError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Atomic rewrite could not rename its temp file into place
    #[error("write to {path} failed after {attempts} attempts")]
    WriteFailed { path: PathBuf, attempts: u32 },

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    // -------------------------------------------------------------------------
    // Encryption Errors
    // -------------------------------------------------------------------------
    #[error("Encryption error: {0}")]
    Crypto(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown table: {0}")]
    UnknownTable(String),
}

impl From<serde_json::Error> for ShardError {
    fn from(err: serde_json::Error) -> Self {
        ShardError::Serialization(err.to_string())
    }
}
