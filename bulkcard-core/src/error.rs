//! Error types for bulkcard

use thiserror::Error;

/// The main error type for bulkcard operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// No collecting session for the given key
    #[error("No active session: {0}")]
    SessionNotFound(String),

    /// Finalize attempted with zero accumulated records
    #[error("No contacts collected in session: {0}")]
    EmptySession(String),

    /// File delivery to the chat platform failed
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// Channel communication errors
    #[error("Channel error: {0}")]
    Channel(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
}

/// A specialized Result type for bulkcard operations
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
