//! # Observability Infrastructure
//!
//! Structured logging setup and the Prometheus metrics exported by the secret
//! manager.

pub mod logging;
pub mod metrics;

pub use logging::log_settings_info;
pub use metrics::{SecretMetrics, SeriesLabels};

use crate::config::LoggingConfig;
use crate::errors::{Error, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber.
///
/// Fails if `config.level` is not a valid filter directive or if a global
/// subscriber has already been installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.level).map_err(|e| {
        Error::observability(format!("Invalid log level '{}': {}", config.level, e))
    })?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.json {
        registry.with(fmt::layer().json().with_ansi(false).with_target(true)).try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    result.map_err(|e| Error::observability(format!("Failed to install subscriber: {}", e)))
}
