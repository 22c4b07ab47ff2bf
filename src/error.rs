//! Error types for cwlogs-tail
//!
//! This module defines the crate-wide error type, using `thiserror` for
//! ergonomic error handling. Layer-specific errors (remote API, decoding)
//! live next to the code that produces them and convert into
//! [`CwTailError`] where they cross into application flow.

use thiserror::Error;

use crate::logs::LogsApiError;

/// Main error type for cwlogs-tail operations
///
/// Covers configuration loading and validation, cursor persistence,
/// remote API calls and the serialization formats the crate reads.
#[derive(Error, Debug)]
pub enum CwTailError {
    /// Configuration-related errors. Always fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Cursor store errors (file or embedded database operations)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Remote CloudWatch Logs API errors
    #[error("API error: {0}")]
    Api(#[from] LogsApiError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for cwlogs-tail operations
///
/// Uses `anyhow::Error` so callers can attach context while the typed
/// [`CwTailError`] stays recoverable through `downcast_ref`.
pub type Result<T> = anyhow::Result<T>;
