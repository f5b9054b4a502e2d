//! Error types for secret field resolution and fetching.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for secrets operations.
pub type Result<T> = std::result::Result<T, SecretsError>;

/// Errors that can occur while resolving, fetching or validating secrets.
///
/// Structural variants (everything except [`FetchFailed`](Self::FetchFailed),
/// [`Timeout`](Self::Timeout) and [`Io`](Self::Io)) are configuration defects and
/// are returned synchronously from `Manager::new` / `populate_config`. Fetch errors
/// never reach readers of a field; they only drive metrics and retries.
#[derive(Error, Debug)]
pub enum SecretsError {
    /// Provider name is not present in the registry.
    #[error("unknown provider type: {name}")]
    UnknownProvider { name: String },

    /// A mapping-shaped field contained no provider key.
    #[error("no provider found for secret at {path}: expected exactly one of [{known}]")]
    NoProvider { path: String, known: String },

    /// A mapping-shaped field contained more than one provider key.
    #[error("multiple providers found for secret at {path}: [{names}]")]
    AmbiguousProvider { path: String, names: String },

    /// A key that is neither a provider nor a field setting.
    #[error("unknown key '{key}' in secret at {path}")]
    UnknownSetting { path: String, key: String },

    /// The raw field value is neither a string nor a mapping.
    #[error("invalid secret at {path}: {reason}")]
    InvalidShape { path: String, reason: String },

    /// Provider-specific configuration failed to convert to the provider's type.
    #[error("invalid configuration for provider '{provider}' at {path}: {message}")]
    InvalidProviderConfig { provider: String, path: String, message: String },

    /// Generic field settings (`refreshInterval`, `default`) are malformed.
    #[error("invalid secret settings at {path}: {message}")]
    InvalidSettings { path: String, message: String },

    /// Field discovery went deeper than the configured bound.
    #[error("maximum traversal depth {max_depth} exceeded at {path}")]
    DepthExceeded { path: String, max_depth: usize },

    /// A provider failed to produce a value.
    #[error("failed to fetch secret: {message}")]
    FetchFailed { message: String },

    /// An operation did not finish within its deadline.
    #[error("operation timed out: {operation} after {duration_ms}ms")]
    Timeout { operation: String, duration_ms: u64 },

    /// `Manager::run` was called more than once.
    #[error("secret manager is already running")]
    AlreadyRunning,

    /// Metric registration failed.
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_yaml::Error),

    /// Reading a secret source failed.
    #[error("I/O error reading {}: {source}", .path.display())]
    Io { path: PathBuf, source: std::io::Error },
}

impl SecretsError {
    /// Create an unknown provider error.
    pub fn unknown_provider(name: impl Into<String>) -> Self {
        Self::UnknownProvider { name: name.into() }
    }

    /// Create an invalid shape error.
    pub fn invalid_shape(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidShape { path: path.into(), reason: reason.into() }
    }

    /// Create an invalid provider config error.
    pub fn invalid_provider_config(
        provider: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidProviderConfig {
            provider: provider.into(),
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an invalid settings error.
    pub fn invalid_settings(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSettings { path: path.into(), message: message.into() }
    }

    /// Create a fetch failed error.
    pub fn fetch_failed(message: impl Into<String>) -> Self {
        Self::FetchFailed { message: message.into() }
    }

    /// Create an I/O error for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, duration: std::time::Duration) -> Self {
        Self::Timeout { operation: operation.into(), duration_ms: duration.as_millis() as u64 }
    }

    /// Whether this error describes a configuration defect rather than a runtime failure.
    pub fn is_structural(&self) -> bool {
        !matches!(
            self,
            Self::FetchFailed { .. } | Self::Timeout { .. } | Self::Io { .. } | Self::AlreadyRunning
        )
    }

    /// Attach a structural path to errors produced before the path was known.
    pub(crate) fn at_path(self, at: &str) -> Self {
        match self {
            Self::InvalidProviderConfig { provider, path, message } if path.is_empty() => {
                Self::InvalidProviderConfig { provider, path: at.to_string(), message }
            }
            Self::InvalidSettings { path, message } if path.is_empty() => {
                Self::InvalidSettings { path: at.to_string(), message }
            }
            Self::InvalidShape { path, reason } if path.is_empty() => {
                Self::InvalidShape { path: at.to_string(), reason }
            }
            other => other,
        }
    }
}
