//! Error types for laodong-core.
//!
//! [`LaodongError`] covers startup and management operations (config, corpus,
//! backend construction, session reset). Failures inside a turn never use it:
//! degraded stages recover locally and terminal turn failures are reported as
//! [`TurnError`] events on the turn stream.

use std::path::PathBuf;

use laodong_db::DbError;
use laodong_model::ModelError;
use serde::Serialize;
use thiserror::Error;

/// Result type alias for laodong-core operations.
pub type LaodongResult<T> = Result<T, LaodongError>;

/// Domain-specific errors for laodong operations.
#[derive(Error, Debug)]
pub enum LaodongError {
    /// Configuration file could not be read or parsed.
    #[error("Config invalid: {0}")]
    InvalidConfig(String),

    /// A configuration value is invalid.
    ///
    /// Used for validation errors detected at load time (e.g., topK=0).
    #[error("Invalid configuration: {message}. {hint}")]
    InvalidConfiguration {
        /// Description of the invalid configuration.
        message: String,
        /// Actionable hint on how to fix it.
        hint: String,
    },

    // =========================================================================
    // Corpus Errors
    // =========================================================================
    /// Corpus file could not be read.
    #[error("Corpus I/O error at `{path}`: {message}")]
    CorpusIo {
        /// Path to the corpus file.
        path: PathBuf,
        /// Description of the I/O error.
        message: String,
    },

    /// A corpus line could not be parsed.
    #[error("Corpus parse error at `{path}`: {message}")]
    CorpusParse {
        /// Path to the corpus file.
        path: PathBuf,
        /// Description of the parse error, including the line number.
        message: String,
    },

    /// Corpus file holds no chunks.
    #[error("Corpus at `{path}` contains no chunks.")]
    CorpusEmpty {
        /// Path to the corpus file.
        path: PathBuf,
    },

    /// The corpus has no vectors but the in-memory dense index was selected.
    #[error("Corpus at `{path}` has no vectors; set backends.dense.vectorsPath, use backends.dense.kind=qdrant, or add vectors.")]
    CorpusMissingVectors {
        /// Path to the corpus file.
        path: PathBuf,
    },

    // =========================================================================
    // Backend Errors
    // =========================================================================
    /// A capability backend could not be constructed.
    #[error("Backend `{backend}` could not be initialized: {reason}")]
    BackendInit {
        /// The backend that failed.
        backend: String,
        /// Reason for the failure.
        reason: String,
    },

    // =========================================================================
    // Session Errors
    // =========================================================================
    /// The session is processing a turn.
    #[error("Session `{session_id}` is busy processing another turn.")]
    SessionBusy {
        /// The busy session.
        session_id: String,
    },

    /// Dense search infrastructure error.
    #[error("Database error: {0}")]
    Db(#[from] DbError),

    /// Inference infrastructure error.
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl LaodongError {
    /// Create an invalid-configuration error with a hint.
    pub fn invalid_configuration(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
            hint: hint.into(),
        }
    }

    /// Create a backend initialization error.
    pub fn backend_init(backend: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::BackendInit {
            backend: backend.into(),
            reason: reason.to_string(),
        }
    }

    /// Actionable hint for the CLI, when one exists.
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::InvalidConfiguration { hint, .. } => Some(hint),
            Self::CorpusIo { .. } => Some("Set corpus.path or pass --corpus"),
            Self::SessionBusy { .. } => Some("Wait for the current answer to finish"),
            Self::Model(ModelError::MissingApiKey { .. }) => {
                Some("Export the API key variable named in the config")
            }
            _ => None,
        }
    }
}

// ============================================================================
// TurnError
// ============================================================================

/// Terminal failure of a single turn, delivered as the last stream event.
///
/// The turn is never committed to session memory when one of these occurs.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TurnError {
    /// The generation backend failed before or during streaming.
    #[error("Generation failed: {message}")]
    Generation { message: String },

    /// The generation backend stopped producing tokens.
    #[error("Generation timed out after {elapsed_ms} ms")]
    GenerationTimeout { elapsed_ms: u64 },

    /// Another turn holds the session.
    #[error("Session `{session_id}` is busy")]
    SessionBusy { session_id: String },

    /// Unexpected failure inside the engine.
    #[error("Internal error: {message}")]
    Internal { message: String },
}
