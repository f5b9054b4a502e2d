//! # Configuration Settings
//!
//! Tuning knobs for the secret manager and the logging setup.

use crate::errors::{Error, Result};
use crate::secrets::walk::DEFAULT_MAX_DEPTH;
use crate::secrets::MarshalPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::{Validate, ValidationError};

/// Timing and traversal settings of a [`Manager`](crate::secrets::Manager).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ManagerSettings {
    /// Bound on the one-shot fetch performed while the manager is constructed
    #[serde(with = "humantime_duration")]
    #[validate(custom(function = "validate_non_zero"))]
    pub initial_fetch_timeout: Duration,

    /// Bound on each background fetch attempt
    #[serde(with = "humantime_duration")]
    #[validate(custom(function = "validate_non_zero"))]
    pub fetch_timeout: Duration,

    /// First delay after a failed background fetch
    #[serde(with = "humantime_duration")]
    #[validate(custom(function = "validate_non_zero"))]
    pub fetch_initial_backoff: Duration,

    /// Cap on the delay between background fetch attempts
    #[serde(with = "humantime_duration")]
    #[validate(custom(function = "validate_non_zero"))]
    pub fetch_max_backoff: Duration,

    /// Longest time the refresh loop sleeps without re-checking
    #[serde(with = "humantime_duration")]
    #[validate(custom(function = "validate_non_zero"))]
    pub max_wait: Duration,

    /// Refresh interval for fields that do not set `refreshInterval`
    #[serde(with = "humantime_duration")]
    #[validate(custom(function = "validate_non_zero"))]
    pub default_refresh_interval: Duration,

    /// Maximum traversal depth during field discovery
    #[validate(range(min = 1, max = 10000, message = "Max depth must be between 1 and 10000"))]
    pub max_depth: usize,

    /// Overrides the process-wide marshal policy for fields of this manager
    pub marshal_policy: Option<MarshalPolicy>,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            initial_fetch_timeout: Duration::from_secs(5),
            fetch_timeout: Duration::from_secs(5 * 60),
            fetch_initial_backoff: Duration::from_secs(1),
            fetch_max_backoff: Duration::from_secs(2 * 60),
            max_wait: Duration::from_secs(5 * 60),
            default_refresh_interval: Duration::from_secs(60 * 60),
            max_depth: DEFAULT_MAX_DEPTH,
            marshal_policy: None,
        }
    }
}

impl ManagerSettings {
    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(Error::from)?;

        if self.fetch_initial_backoff > self.fetch_max_backoff {
            return Err(Error::validation(
                "fetch_initial_backoff cannot be greater than fetch_max_backoff",
            ));
        }

        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `config_secrets=debug,info`
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}

fn validate_non_zero(value: &Duration) -> std::result::Result<(), ValidationError> {
    if value.is_zero() {
        let mut err = ValidationError::new("non_zero");
        err.message = Some("Duration must be greater than zero".into());
        return Err(err);
    }
    Ok(())
}

/// Serde adapter writing durations as humantime strings (`5m`, `1h 30m`).
pub(crate) mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = ManagerSettings::default();
        assert_eq!(settings.initial_fetch_timeout, Duration::from_secs(5));
        assert_eq!(settings.fetch_timeout, Duration::from_secs(300));
        assert_eq!(settings.fetch_max_backoff, Duration::from_secs(120));
        assert_eq!(settings.default_refresh_interval, Duration::from_secs(3600));
        assert_eq!(settings.max_depth, 50);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_zero_duration_rejected() {
        let settings = ManagerSettings { max_wait: Duration::ZERO, ..Default::default() };
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
    }

    #[test]
    fn test_backoff_ordering_rejected() {
        let settings = ManagerSettings {
            fetch_initial_backoff: Duration::from_secs(10),
            fetch_max_backoff: Duration::from_secs(1),
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_deserialize_humantime() {
        let settings: ManagerSettings =
            serde_yaml::from_str("fetch_timeout: 30s\nmax_wait: 1m 30s\nmarshal_policy: expose_inline\n")
                .unwrap();
        assert_eq!(settings.fetch_timeout, Duration::from_secs(30));
        assert_eq!(settings.max_wait, Duration::from_secs(90));
        assert_eq!(settings.marshal_policy, Some(MarshalPolicy::ExposeInline));
        assert_eq!(settings.max_depth, 50);
    }

    #[test]
    fn test_serialize_humantime() {
        let yaml = serde_yaml::to_string(&ManagerSettings::default()).unwrap();
        assert!(yaml.contains("default_refresh_interval: 1h"));
    }

    #[test]
    fn test_logging_validation() {
        let config = LoggingConfig { level: String::new(), json: false };
        assert!(Validate::validate(&config).is_err());
        assert!(Validate::validate(&LoggingConfig::default()).is_ok());
    }
}
