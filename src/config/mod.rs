//! # Configuration Management
//!
//! Settings for the secret manager and logging, loaded from environment
//! variables or deserialized from a larger application config.

pub mod settings;

pub use settings::{LoggingConfig, ManagerSettings};

use crate::errors::{Error, Result};
use crate::secrets::MarshalPolicy;
use std::time::Duration;

const ENV_PREFIX: &str = "SECRETS_";

fn env_var(name: &str) -> Option<String> {
    std::env::var(format!("{}{}", ENV_PREFIX, name)).ok().filter(|v| !v.trim().is_empty())
}

fn env_duration(name: &str, default: Duration) -> Result<Duration> {
    match env_var(name) {
        Some(raw) => humantime::parse_duration(raw.trim()).map_err(|e| {
            Error::config(format!("Invalid {}{}: {}", ENV_PREFIX, name, e))
        }),
        None => Ok(default),
    }
}

impl ManagerSettings {
    /// Create settings from `SECRETS_*` environment variables.
    ///
    /// Durations use humantime syntax (`30s`, `5m`). Unset variables keep their
    /// defaults; the result is validated before it is returned.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let max_depth = match env_var("MAX_DEPTH") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e| Error::config(format!("Invalid SECRETS_MAX_DEPTH: {}", e)))?,
            None => defaults.max_depth,
        };

        let marshal_policy = match env_var("MARSHAL_POLICY").as_deref().map(str::trim) {
            Some("redact") => Some(MarshalPolicy::Redact),
            Some("expose_inline") => Some(MarshalPolicy::ExposeInline),
            Some(other) => {
                return Err(Error::config(format!(
                    "Invalid SECRETS_MARSHAL_POLICY: {} (expected redact or expose_inline)",
                    other
                )))
            }
            None => defaults.marshal_policy,
        };

        let settings = Self {
            initial_fetch_timeout: env_duration("INITIAL_FETCH_TIMEOUT", defaults.initial_fetch_timeout)?,
            fetch_timeout: env_duration("FETCH_TIMEOUT", defaults.fetch_timeout)?,
            fetch_initial_backoff: env_duration("FETCH_INITIAL_BACKOFF", defaults.fetch_initial_backoff)?,
            fetch_max_backoff: env_duration("FETCH_MAX_BACKOFF", defaults.fetch_max_backoff)?,
            max_wait: env_duration("MAX_WAIT", defaults.max_wait)?,
            default_refresh_interval: env_duration(
                "DEFAULT_REFRESH_INTERVAL",
                defaults.default_refresh_interval,
            )?,
            max_depth,
            marshal_policy,
        };

        settings.validate()?;
        Ok(settings)
    }
}

impl LoggingConfig {
    /// Create logging configuration from `SECRETS_LOG_LEVEL` and `SECRETS_LOG_JSON`.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let level = env_var("LOG_LEVEL").unwrap_or(defaults.level);
        let json = match env_var("LOG_JSON").as_deref().map(str::trim) {
            Some("1") | Some("true") => true,
            Some("0") | Some("false") => false,
            Some(other) => {
                return Err(Error::config(format!("Invalid SECRETS_LOG_JSON: {}", other)))
            }
            None => defaults.json,
        };

        Ok(Self { level, json })
    }
}
