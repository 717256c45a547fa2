//! Error types for the memory substrate.

use uuid::Uuid;

use crate::embeddings::ProviderError;

/// Result type alias for memory operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the memory substrate
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(Uuid),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Embedding dimension mismatch: got {actual}, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// A multi-table transaction failed and was rolled back.
    #[error("Partial write rolled back: {0}")]
    PartialWrite(String),

    /// The executor exhausted its turn budget; the task is recorded as partial.
    #[error("Executor exceeded {max_turns} turns ({tool_calls} tool calls)")]
    LoopExceeded { max_turns: u32, tool_calls: u32 },

    #[error("Malformed executor response: {0}")]
    Parse(String),

    /// Schema unavailable or index invariants broken. Fatal for the process.
    #[error("Store corruption: {0}")]
    StoreCorruption(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Check if this error is recoverable (can retry with backoff)
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Storage(_) | Error::PartialWrite(_) | Error::Io(_) => true,
            Error::Provider(p) => p.is_retryable(),
            Error::NotFound(_)
            | Error::Conflict(_)
            | Error::DimensionMismatch { .. }
            | Error::LoopExceeded { .. }
            | Error::Parse(_)
            | Error::StoreCorruption(_)
            | Error::Serialization(_)
            | Error::InvalidInput(_)
            | Error::InvalidState(_)
            | Error::Configuration(_) => false,
        }
    }

    /// Check if this error should terminate the process.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::StoreCorruption(_))
    }
}
