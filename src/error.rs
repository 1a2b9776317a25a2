//! Error types for content-export
//!
//! Failures are contained at the smallest unit that can absorb them: a single
//! media URL, a single item, or (for page fetches) a node type's pagination.
//! This module only defines the vocabulary; containment happens at call sites.

use thiserror::Error;

/// Result type alias for content-export operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for content-export
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "export.export_path")
        key: Option<String>,
    },

    /// Token acquisition failed
    #[error("authentication error: {0}")]
    Auth(String),

    /// The API answered with a non-success status
    #[error("API error: HTTP {status}: {message}")]
    Api {
        /// HTTP status code returned by the server
        status: u16,
        /// What was being requested when the status came back
        message: String,
    },

    /// Response body did not have the expected GraphQL envelope shape
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL could not be parsed or joined
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A worker task panicked or was aborted
    #[error("worker task failed: {0}")]
    Task(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Returns the configuration key responsible for this error, if any
    pub fn config_key(&self) -> Option<&str> {
        match self {
            Error::Config { key, .. } => key.as_deref(),
            _ => None,
        }
    }
}
