//! Error types for the chunking pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (bad parameters, missing input, conflicting options)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid filename filter pattern
    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Text could not be extracted from a document
    #[error("Failed to extract text from '{filename}': {message}")]
    Extraction { filename: String, message: String },

    /// Output sink could not be written
    #[error("Failed to write '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Resume state is inconsistent with the output it describes
    #[error("Progress state error ({path}): {message}")]
    State { path: String, message: String },

    /// A single file exceeded the per-file time limit
    #[error("Processing timed out after {0}s")]
    Timeout(u64),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML configuration parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an extraction error
    pub fn extraction(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Extraction {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Create a write error for the given sink path
    pub fn write(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    /// Create a progress state error
    pub fn state(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::State {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether this error must end the whole run rather than a single file
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Config(_) | Error::InvalidPattern { .. } | Error::Write { .. } | Error::State { .. }
        )
    }
}
