//! Error types for adapter calls.

use thiserror::Error;

/// Errors returned by the Kafka and control-API adapters.
#[derive(Error, Debug)]
pub enum AdapterError {
    /// The remote resource does not exist (empty topic, unmatched key, 404).
    #[error("not found: {0}")]
    NotFound(String),

    /// The remote side could not be reached or answered with an error.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The remote side answered with a body that could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl AdapterError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type alias for adapter calls.
pub type Result<T> = std::result::Result<T, AdapterError>;
