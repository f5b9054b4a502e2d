//! # config-secrets
//!
//! Secret-bearing configuration fields with background refresh, validation-gated
//! rotation and Prometheus metrics.
//!
//! ## Architecture
//!
//! ```text
//! Config graph --discovery--> Fields --parse--> ProviderConfig --dedup--> ManagedSecret
//!                                                                              |
//!                              Field::value() <--promote-- fetch/validate <-- Manager::run
//! ```
//!
//! ## Core Components
//!
//! - **Secrets**: fields, providers, registry, discovery and the manager ([`secrets`])
//! - **Configuration**: manager and logging settings from serde or `SECRETS_*` env vars ([`config`])
//! - **Observability**: tracing subscriber setup and metric vectors ([`observability`])
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use config_secrets::secrets::{Field, Manager, ManagerOptions};
//! use config_secrets::{config::LoggingConfig, observability, walk_fields, Result};
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(serde::Deserialize)]
//! struct AppConfig {
//!     api_key: Field,
//! }
//! walk_fields!(AppConfig { api_key });
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     observability::init_logging(&LoggingConfig::from_env()?)?;
//!
//!     let config: AppConfig = serde_yaml::from_str("api_key: {file: /run/secrets/api_key}")
//!         .map_err(|e| config_secrets::Error::config(e.to_string()))?;
//!     let manager = Manager::new(&config, ManagerOptions::default()).await?;
//!
//!     let shutdown = CancellationToken::new();
//!     let runner = tokio::spawn({
//!         let manager = manager.clone();
//!         let shutdown = shutdown.clone();
//!         async move { manager.run(shutdown).await }
//!     });
//!
//!     println!("key length: {}", config.api_key.value().len());
//!     shutdown.cancel();
//!     let _ = runner.await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod errors;
pub mod observability;
pub mod secrets;

// Re-export commonly used types and traits
pub use config::{LoggingConfig, ManagerSettings};
pub use errors::{Error, Result};
pub use secrets::{Field, Manager, ManagerOptions, SecretsError};

/// Library version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
