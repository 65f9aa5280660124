use std::time::Duration;

use thiserror::Error;

/// Failure reported by a remote embedding or completion capability.
///
/// `RateLimited`, `Timeout` and `Unavailable` are transient and eligible for
/// retry; the rest are final.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("request timed out")]
    Timeout,

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("request rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl RemoteError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Timeout | Self::Unavailable(_))
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Maps a non-success HTTP status onto the taxonomy.
    pub fn from_status(status: u16, body: String, retry_after: Option<Duration>) -> Self {
        match status {
            429 => Self::RateLimited { retry_after },
            408 => Self::Timeout,
            500..=599 => Self::Unavailable(format!("status {status}: {body}")),
            _ => Self::Rejected { status, body },
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Embedding service failed after {attempts} attempt(s): {cause}")]
    EmbeddingService {
        attempts: u32,
        #[source]
        cause: RemoteError,
    },

    #[error("Generation service failed after {attempts} attempt(s): {cause}")]
    GenerationService {
        attempts: u32,
        #[source]
        cause: RemoteError,
    },

    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Ingestion of '{document}' failed: {cause}")]
    Ingestion {
        document: String,
        #[source]
        cause: Box<Error>,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn index_unavailable(err: impl std::fmt::Display) -> Self {
        Self::IndexUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
