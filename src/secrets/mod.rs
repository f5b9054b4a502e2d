//! Secret-bearing configuration fields.
//!
//! Configuration structs declare [`Field`]s wherever a secret lives. A field is
//! written either as a bare string (an inline secret) or as a mapping naming
//! exactly one registered provider:
//!
//! ```yaml
//! api_key: "xyz"                      # inline
//! password:
//!   file: {path: /run/secrets/db}     # re-read on every refresh
//!   refreshInterval: 5m
//!   default: changeme
//! ```
//!
//! # Architecture
//!
//! - [`Provider`] / [`ProviderConfig`]: fetch a secret from its backing source
//! - [`ProviderRegistry`]: provider type name -> config parser
//! - [`walk`]: discovers fields anywhere in a configuration graph
//! - [`Manager`]: resolves fields, deduplicates identical sources, refreshes in the background
//! - [`SecretValidator`]: optional gate before a rotated value replaces the current one
//!
//! # Example
//!
//! ```rust,ignore
//! use config_secrets::secrets::{Field, Manager, ManagerOptions};
//! use config_secrets::walk_fields;
//!
//! #[derive(serde::Deserialize)]
//! struct Config {
//!     api_key: Field,
//! }
//! walk_fields!(Config { api_key });
//!
//! let config: Config = serde_yaml::from_str(&text)?;
//! let manager = Manager::new(&config, ManagerOptions::default()).await?;
//! tokio::spawn({
//!     let manager = manager.clone();
//!     async move { manager.run(shutdown).await }
//! });
//!
//! let key = config.api_key.value();
//! ```
//!
//! # Custom providers
//!
//! Implement [`ProviderConfig`] (plus `Deserialize`) and [`Provider`], then register
//! the config type on a registry: `registry.register::<VaultConfig>("vault")`. The
//! field shape becomes `{vault: {...}}`.

pub mod error;
pub mod field;
mod managed;
pub mod manager;
pub mod marshal;
pub mod parse;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod retry;
pub mod types;
pub mod validate;
pub mod walk;

pub use error::{Result, SecretsError};
pub use field::{Field, UNRESOLVED_FIELD_PANIC};
pub use manager::{Manager, ManagerOptions};
pub use marshal::{
    default_marshal_policy, set_default_marshal_policy, MarshalPolicy, REDACTED_PLACEHOLDER,
};
pub use parse::{parse_field, FieldSettings, ParsedField, SecretSource};
pub use provider::{Provider, ProviderConfig, ProviderKind, SerdeKind};
pub use providers::{FileProviderConfig, InlineProviderConfig};
pub use registry::{default_registry, ProviderRegistry};
pub use retry::Backoff;
pub use types::{SecretStatus, SecretString};
pub use validate::{SecretValidator, ValidatorSettings};
pub use walk::{find_all, Discovered, Found, Walk, DEFAULT_MAX_DEPTH};
