//! Error types for Lete.

use thiserror::Error;

/// Library-level error type for Lete operations.
#[derive(Error, Debug)]
pub enum LeteError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Media processing failed: {0}")]
    Media(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Captioning failed: {0}")]
    Captioning(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Index consistency error: {0}")]
    IndexConsistency(String),

    #[error("Job store error: {0}")]
    JobStore(String),

    #[error("Invalid job transition: {0}")]
    InvalidTransition(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("External tool failed: {0}")]
    ToolFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl LeteError {
    /// Whether this failure came from an external dependency that may recover.
    ///
    /// Transient errors are retried with bounded exponential backoff; everything
    /// else fails the current stage immediately. A missing local tool or
    /// malformed input never becomes retriable.
    pub fn is_transient(&self) -> bool {
        matches!(self, LeteError::Http(_) | LeteError::OpenAI(_))
    }
}

/// Result type alias for Lete operations.
pub type Result<T> = std::result::Result<T, LeteError>;
