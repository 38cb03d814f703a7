//! Error types for VTel

use thiserror::Error;

/// Result type alias for VTel operations
pub type Result<T> = std::result::Result<T, VtelError>;

/// Main error type for VTel
#[derive(Error, Debug)]
pub enum VtelError {
    #[error("Invalid timestamp '{value}': {reason}")]
    InvalidTimestamp { value: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl VtelError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
