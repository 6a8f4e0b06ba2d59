//! Error types for brewcache core.

use std::fmt;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in cache and journal operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A persisted structure could not be read, decoded, encoded or written.
    #[error("cache unavailable ({key}): {message}")]
    CacheUnavailable {
        /// Store key of the structure.
        key: String,
        /// Underlying failure.
        message: String,
    },

    /// A mutation targeted an id that is not in the cache.
    #[error("entity not found: {id}")]
    NotFound {
        /// The id that was not found.
        id: String,
    },

    /// An update patch could not be merged into the record.
    #[error("invalid patch: {0}")]
    InvalidPatch(String),
}

impl CoreError {
    /// Wraps a storage or codec failure for the structure stored at `key`.
    pub fn unavailable(key: impl Into<String>, err: impl fmt::Display) -> Self {
        Self::CacheUnavailable {
            key: key.into(),
            message: err.to_string(),
        }
    }

    /// Creates a `NotFound` error for `id`.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Returns true if this error reports a storage fault.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::CacheUnavailable { .. })
    }
}
