//! Error types for throttling operations.

use thiserror::Error;

/// Main error type for throttler operations.
///
/// Admission outcomes are never encoded here: a denied request is a plain
/// `false`/`true` answer, while these variants mean no answer could be given.
#[derive(Error, Debug)]
pub enum ThrottleError {
    /// A caller supplied an unusable argument (empty namespace, zero increment, ...)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The counter store could not be reached or failed mid-operation
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A limit policy with a zero limit or zero window that was not declared as blocked
    #[error("Misconfigured policy: {0}")]
    MisconfiguredPolicy(String),

    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<::config::ConfigError> for ThrottleError {
    fn from(err: ::config::ConfigError) -> Self {
        ThrottleError::Config(err.to_string())
    }
}

/// Result type alias for throttler operations.
pub type Result<T> = std::result::Result<T, ThrottleError>;
