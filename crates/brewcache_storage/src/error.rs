//! Error types for storage operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The on-disk document could not be encoded or decoded.
    #[error("store document corrupted: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Another process holds the store lock.
    #[error("store locked: another process has exclusive access to {path:?}")]
    Locked {
        /// Path of the locked store file.
        path: PathBuf,
    },

    /// The store refused the request.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
