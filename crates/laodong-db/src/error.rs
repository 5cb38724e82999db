//! Error types for laodong-db.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for laodong-db operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors that can occur in laodong-db operations.
#[derive(Debug, Error)]
pub enum DbError {
    // ========================================================================
    // Vector index errors
    // ========================================================================
    /// Vector file I/O error.
    #[error("Vector index I/O error at {path}: {message}")]
    VectorIo { path: PathBuf, message: String },

    /// Vector file parse error.
    #[error("Vector index parse error at {path}: {message}")]
    VectorParse { path: PathBuf, message: String },

    /// Vector dimension mismatch.
    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    // ========================================================================
    // Remote store errors
    // ========================================================================
    /// The remote vector store could not be reached.
    #[error("Vector store '{store}' unreachable: {message}")]
    Unreachable { store: String, message: String },

    /// The remote vector store answered with a non-success status.
    #[error("Vector store '{store}' returned HTTP {status}: {body}")]
    Status {
        store: String,
        status: u16,
        body: String,
    },

    /// The remote vector store answered with a body we could not interpret.
    #[error("Vector store '{store}' returned an invalid response: {message}")]
    InvalidResponse { store: String, message: String },

    // ========================================================================
    // General errors
    // ========================================================================
    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// IO error wrapper.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error wrapper.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic internal error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a vector I/O error.
    pub fn vector_io(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::VectorIo {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a vector parse error.
    pub fn vector_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::VectorParse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an unreachable-store error.
    pub fn unreachable(store: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unreachable {
            store: store.into(),
            message: message.into(),
        }
    }

    /// Create an invalid-response error.
    pub fn invalid_response(store: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            store: store.into(),
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
