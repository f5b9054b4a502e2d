//! # Metrics Collection
//!
//! Prometheus metric vectors for managed secrets. Every series is labeled by
//! provider type and structural path; series are deleted when the secret they
//! describe is retired.

use crate::secrets::error::Result;
use crate::secrets::SecretStatus;
use chrono::{DateTime, Utc};
use prometheus::{
    GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry,
};
use std::time::Duration;

const LABELS: [&str; 2] = ["provider", "path"];

/// Label values identifying one secret's series.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesLabels {
    pub provider: String,
    pub path: String,
}

impl SeriesLabels {
    pub fn new(provider: impl Into<String>, path: impl Into<String>) -> Self {
        Self { provider: provider.into(), path: path.into() }
    }

    fn values(&self) -> [&str; 2] {
        [self.provider.as_str(), self.path.as_str()]
    }
}

/// Metric vectors owned by one manager.
#[derive(Clone)]
pub struct SecretMetrics {
    last_successful_fetch: GaugeVec,
    state: IntGaugeVec,
    fetch_success: IntCounterVec,
    fetch_failures: IntCounterVec,
    fetch_duration: HistogramVec,
    validation_failures: IntCounterVec,
}

impl std::fmt::Debug for SecretMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretMetrics").finish_non_exhaustive()
    }
}

impl SecretMetrics {
    /// Create the metric vectors without registering them anywhere.
    pub fn new() -> Result<Self> {
        let last_successful_fetch = GaugeVec::new(
            Opts::new(
                "secret_last_successful_fetch_seconds",
                "Unix time of the last successful fetch of a secret",
            ),
            &LABELS,
        )?;
        let state = IntGaugeVec::new(
            Opts::new(
                "secret_state",
                "Secret state (0=success, 1=stale, 2=error, 3=initializing)",
            ),
            &LABELS,
        )?;
        let fetch_success = IntCounterVec::new(
            Opts::new("secret_fetch_success_total", "Total number of successful secret fetches"),
            &LABELS,
        )?;
        let fetch_failures = IntCounterVec::new(
            Opts::new("secret_fetch_failures_total", "Total number of failed secret fetches"),
            &LABELS,
        )?;
        let fetch_duration = HistogramVec::new(
            HistogramOpts::new("secret_fetch_duration_seconds", "Duration of secret fetch attempts"),
            &LABELS,
        )?;
        let validation_failures = IntCounterVec::new(
            Opts::new(
                "secret_validation_failures_total",
                "Total number of rejected secret validation attempts",
            ),
            &LABELS,
        )?;

        Ok(Self {
            last_successful_fetch,
            state,
            fetch_success,
            fetch_failures,
            fetch_duration,
            validation_failures,
        })
    }

    /// Register every vector with `registry`.
    pub fn register(&self, registry: &Registry) -> Result<()> {
        registry.register(Box::new(self.last_successful_fetch.clone()))?;
        registry.register(Box::new(self.state.clone()))?;
        registry.register(Box::new(self.fetch_success.clone()))?;
        registry.register(Box::new(self.fetch_failures.clone()))?;
        registry.register(Box::new(self.fetch_duration.clone()))?;
        registry.register(Box::new(self.validation_failures.clone()))?;
        Ok(())
    }

    /// Create the series for a newly managed secret.
    pub fn init_series(&self, labels: &SeriesLabels, status: SecretStatus) {
        let values = labels.values();
        self.state.with_label_values(&values).set(status.as_metric());
        self.fetch_success.with_label_values(&values);
        self.fetch_failures.with_label_values(&values);
    }

    pub fn record_fetch_success(&self, labels: &SeriesLabels, elapsed: Duration, at: DateTime<Utc>) {
        let values = labels.values();
        self.fetch_success.with_label_values(&values).inc();
        self.fetch_duration.with_label_values(&values).observe(elapsed.as_secs_f64());
        self.last_successful_fetch
            .with_label_values(&values)
            .set(at.timestamp_millis() as f64 / 1000.0);
        self.state.with_label_values(&values).set(SecretStatus::Success.as_metric());
    }

    pub fn record_fetch_failure(&self, labels: &SeriesLabels, elapsed: Duration, status: SecretStatus) {
        let values = labels.values();
        self.fetch_failures.with_label_values(&values).inc();
        self.fetch_duration.with_label_values(&values).observe(elapsed.as_secs_f64());
        self.state.with_label_values(&values).set(status.as_metric());
    }

    pub fn record_validation_failure(&self, labels: &SeriesLabels) {
        self.validation_failures.with_label_values(&labels.values()).inc();
    }

    /// Delete every series of a retired secret.
    pub fn remove(&self, labels: &SeriesLabels) {
        let values = labels.values();
        // Missing series are fine: not every vector has a child for every secret.
        let _ = self.last_successful_fetch.remove_label_values(&values);
        let _ = self.state.remove_label_values(&values);
        let _ = self.fetch_success.remove_label_values(&values);
        let _ = self.fetch_failures.remove_label_values(&values);
        let _ = self.fetch_duration.remove_label_values(&values);
        let _ = self.validation_failures.remove_label_values(&values);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{Encoder, TextEncoder};

    fn exposition(registry: &Registry) -> String {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&registry.gather(), &mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_register_and_record() {
        let registry = Registry::new();
        let metrics = SecretMetrics::new().unwrap();
        metrics.register(&registry).unwrap();

        let labels = SeriesLabels::new("file", "Config.password");
        metrics.init_series(&labels, SecretStatus::Initializing);
        let text = exposition(&registry);
        assert!(text.contains(r#"secret_state{path="Config.password",provider="file"} 3"#));

        metrics.record_fetch_failure(&labels, Duration::from_millis(5), SecretStatus::Error);
        metrics.record_fetch_success(&labels, Duration::from_millis(5), Utc::now());

        let text = exposition(&registry);
        assert!(text.contains(r#"secret_state{path="Config.password",provider="file"} 0"#));
        assert!(text.contains(r#"secret_fetch_failures_total{path="Config.password",provider="file"} 1"#));
        assert!(text.contains(r#"secret_fetch_success_total{path="Config.password",provider="file"} 1"#));
        assert!(text.contains("secret_fetch_duration_seconds_count"));
        assert!(text.contains("secret_last_successful_fetch_seconds{"));
    }

    #[test]
    fn test_double_registration_fails() {
        let registry = Registry::new();
        SecretMetrics::new().unwrap().register(&registry).unwrap();
        assert!(SecretMetrics::new().unwrap().register(&registry).is_err());
    }

    #[test]
    fn test_remove_deletes_series() {
        let registry = Registry::new();
        let metrics = SecretMetrics::new().unwrap();
        metrics.register(&registry).unwrap();

        let keep = SeriesLabels::new("file", "Config.a");
        let gone = SeriesLabels::new("inline", "Config.b");
        metrics.init_series(&keep, SecretStatus::Initializing);
        metrics.init_series(&gone, SecretStatus::Initializing);
        assert!(exposition(&registry).contains(r#"path="Config.b""#));

        metrics.remove(&gone);
        let text = exposition(&registry);
        assert!(text.contains(r#"path="Config.a""#));
        assert!(!text.contains(r#"path="Config.b""#));
    }
}
