//! Error types for the sync layer.

use brewcache_core::CoreError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Result type for remote API calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors that end a reconciliation pass or a repository call.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Another pass is already running.
    #[error("sync already in progress")]
    SyncInProgress,

    /// Local cache or journal failure.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl SyncError {
    /// Returns true if the error comes from the single-flight guard.
    pub fn is_in_progress(&self) -> bool {
        matches!(self, SyncError::SyncInProgress)
    }
}

/// Failure reported by a remote API call.
///
/// The reconciler only records the display text; the variants exist for
/// remote implementations and their callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the call can be retried.
        retryable: bool,
    },

    /// The server refused the payload.
    #[error("rejected: {0}")]
    Rejected(String),

    /// The server has no entity with this id.
    #[error("not found on server: {0}")]
    NotFound(String),

    /// The server failed while handling the call.
    #[error("server error: {0}")]
    ServerError(String),
}

impl RemoteError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Transport { retryable, .. } => *retryable,
            RemoteError::ServerError(_) => true,
            RemoteError::Rejected(_) | RemoteError::NotFound(_) => false,
        }
    }
}
