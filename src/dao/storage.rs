use std::error::Error;
use thiserror::Error;

use crate::state::scoreboard::GameId;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A conditional write lost against a concurrent writer.
    #[error("score for game {game_id} changed concurrently (expected version {expected}, found {actual:?})")]
    Conflict {
        game_id: GameId,
        expected: u64,
        actual: Option<u64>,
    },
    /// The row a write targeted does not exist.
    #[error("{what} not found")]
    NotFound { what: String },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Shorthand for a missing row.
    pub fn not_found(what: impl Into<String>) -> Self {
        StorageError::NotFound { what: what.into() }
    }
}
