//! Error types for the Isenguard service.

use thiserror::Error;

/// Main error type for Isenguard operations.
#[derive(Error, Debug)]
pub enum IsenguardError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors raised by the shared counter store
    #[error("Store error: {0}")]
    Store(#[from] redis::RedisError),

    /// A rate limit was reached while enforcing it
    #[error("Rate limit reached: {realm} ({limit})")]
    LimitReached {
        /// The realm whose limit was breached
        realm: String,
        /// Human-readable limit description, e.g. "5 calls within 60s"
        limit: String,
    },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Isenguard operations.
pub type Result<T> = std::result::Result<T, IsenguardError>;
