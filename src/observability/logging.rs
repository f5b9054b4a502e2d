//! # Structured Logging
//!
//! Span macros and helpers used by the secret manager. Secret values and
//! deduplication identities (which embed inline literals) are never recorded;
//! spans carry the provider type and the structural path only.

/// Create a tracing span for a secret operation (`fetch`, `validate`, ...).
///
/// ```rust,ignore
/// let span = secret_span!("fetch", "file", "Config.db.password");
/// let span = secret_span!("validate", "file", "Config.db.password", attempt = 2);
/// ```
#[macro_export]
macro_rules! secret_span {
    ($operation:expr, $provider:expr, $path:expr) => {
        tracing::debug_span!(
            "secret_operation",
            operation = %$operation,
            provider = %$provider,
            path = %$path
        )
    };
    ($operation:expr, $provider:expr, $path:expr, $($field:tt)*) => {
        tracing::debug_span!(
            "secret_operation",
            operation = %$operation,
            provider = %$provider,
            path = %$path,
            $($field)*
        )
    };
}

/// Log manager settings at startup
pub fn log_settings_info(settings: &crate::config::ManagerSettings) {
    tracing::info!(
        initial_fetch_timeout = %humantime::format_duration(settings.initial_fetch_timeout),
        fetch_timeout = %humantime::format_duration(settings.fetch_timeout),
        default_refresh_interval = %humantime::format_duration(settings.default_refresh_interval),
        max_wait = %humantime::format_duration(settings.max_wait),
        max_depth = settings.max_depth,
        "Secret manager configuration"
    );
}
