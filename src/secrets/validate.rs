//! Validation-gated rotation.
//!
//! When a field carries a [`SecretValidator`], a freshly fetched value is held as
//! *pending* and only replaces the current value once the validator accepts it.
//! If the validator never accepts a candidate, the previous value stays in force.

use super::retry::Backoff;
use async_trait::async_trait;
use std::time::Duration;

/// Confirms that a candidate secret is usable before it is promoted.
#[async_trait]
pub trait SecretValidator: Send + Sync {
    /// Return `true` if `candidate` works. Bounded by [`ValidatorSettings::timeout`];
    /// a timeout counts as a rejection.
    async fn validate(&self, candidate: &str) -> bool;

    fn settings(&self) -> ValidatorSettings {
        ValidatorSettings::default()
    }
}

/// Retry parameters for a validator, distinct from the fetch backoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidatorSettings {
    /// Deadline for a single `validate` call
    pub timeout: Duration,
    /// Delay schedule between attempts
    pub backoff: Backoff,
    /// Total attempts per candidate
    pub max_retries: u32,
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            backoff: Backoff::new(Duration::from_secs(1), Duration::from_secs(30)),
            max_retries: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AcceptAll;

    #[async_trait]
    impl SecretValidator for AcceptAll {
        async fn validate(&self, _candidate: &str) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_default_settings() {
        let validator = AcceptAll;
        assert!(validator.validate("anything").await);

        let settings = validator.settings();
        assert_eq!(settings.max_retries, 5);
        assert_eq!(settings.timeout, Duration::from_secs(30));
        assert_eq!(settings.backoff.delay_for_attempt(1), Duration::from_secs(1));
    }
}
