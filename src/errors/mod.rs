//! # Error Handling
//!
//! Crate-level error type for settings loading and observability setup.
//! The secret subsystem has its own [`SecretsError`](crate::secrets::SecretsError),
//! which converts into [`Error`] so callers can use a single `?` chain at startup.

use crate::secrets::SecretsError;

/// Custom result type for crate-level operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the crate
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Settings failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Observability setup errors (subscriber already installed, bad filter)
    #[error("Observability error: {0}")]
    Observability(String),

    /// Errors from the secret subsystem
    #[error(transparent)]
    Secrets(#[from] SecretsError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    /// Create a new observability error
    pub fn observability<S: Into<String>>(message: S) -> Self {
        Self::Observability(message.into())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| {
                        e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string())
                    })
                    .collect();
                format!("{}: {}", field, error_messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::validation(format!("Validation failed: {}", message))
    }
}
