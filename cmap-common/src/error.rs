//! Common error types for CMAP

use thiserror::Error;

/// Common result type for CMAP operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across CMAP crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// A configured field is absent from the fetched document
    #[error("Missing field: {field}")]
    MissingField { field: String },

    /// A nested field is present but does not match the expected shape
    #[error("Malformed field {field}: {reason}")]
    Malformed { field: String, reason: String },

    /// Snapshot codec tag recognized but not compiled in
    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a `Malformed` error
    pub fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Malformed {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a `MissingField` error
    pub fn missing(field: impl Into<String>) -> Self {
        Error::MissingField {
            field: field.into(),
        }
    }
}
