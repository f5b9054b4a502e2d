//! Provider traits.
//!
//! A [`ProviderConfig`] is the typed, parsed form of one provider's section of a
//! secret field (`file: {path: ...}`); it builds the live [`Provider`] that the
//! manager polls. A [`ProviderKind`] is what the registry stores under a provider
//! name: it turns the raw section into a boxed `ProviderConfig`.

use super::error::{Result, SecretsError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Fetches the current value of one secret from its backing source.
///
/// The manager never runs two fetches of the same provider concurrently, and it
/// bounds every call with a timeout; implementations only need to be cancel-safe
/// (dropping the future must not leave shared state half-updated).
#[async_trait]
pub trait Provider: Send + Sync + fmt::Debug {
    /// Retrieve the current secret text.
    async fn fetch_secret(&self) -> Result<String>;
}

/// Parsed, provider-specific configuration.
pub trait ProviderConfig: Send + Sync + fmt::Debug + 'static {
    /// Build a live provider from this configuration.
    fn new_provider(&self) -> Result<Arc<dyn Provider>>;

    /// Deduplication identity.
    ///
    /// Two configurations with the same identity must always fetch identical
    /// content; the manager runs a single fetch worker for all of them. Identities
    /// should be namespaced by provider name.
    fn id(&self) -> String;

    /// Deep, independent copy.
    fn clone_box(&self) -> Box<dyn ProviderConfig>;

    /// Configuration form used when marshaling a field back out.
    fn to_value(&self) -> Result<serde_yaml::Value>;

    /// Whether [`to_value`](Self::to_value) reveals secret material.
    fn is_sensitive(&self) -> bool {
        false
    }
}

impl Clone for Box<dyn ProviderConfig> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Registry entry: converts a provider's raw configuration section into a typed config.
pub trait ProviderKind: Send + Sync {
    fn parse(&self, raw: serde_yaml::Value) -> Result<Box<dyn ProviderConfig>>;
}

/// [`ProviderKind`] for any serde-deserializable config type.
///
/// The raw section is converted with `serde_yaml::from_value`, a direct
/// value-to-type conversion: numbers, booleans and nested structures keep their
/// YAML types without passing through text.
pub struct SerdeKind<C> {
    _config: PhantomData<fn() -> C>,
}

impl<C> SerdeKind<C> {
    pub fn new() -> Self {
        Self { _config: PhantomData }
    }
}

impl<C> Default for SerdeKind<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> ProviderKind for SerdeKind<C>
where
    C: ProviderConfig + DeserializeOwned,
{
    fn parse(&self, raw: serde_yaml::Value) -> Result<Box<dyn ProviderConfig>> {
        let config: C = serde_yaml::from_value(raw)
            .map_err(|e| SecretsError::invalid_provider_config("", "", e.to_string()))?;
        Ok(Box::new(config))
    }
}

/// Serialize a config into a YAML value for [`ProviderConfig::to_value`].
pub fn to_yaml_value<T: Serialize>(config: &T) -> Result<serde_yaml::Value> {
    Ok(serde_yaml::to_value(config)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct PortConfig {
        host: String,
        port: u16,
        tls: bool,
    }

    #[derive(Debug)]
    struct PortProvider(String);

    #[async_trait]
    impl Provider for PortProvider {
        async fn fetch_secret(&self) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    impl ProviderConfig for PortConfig {
        fn new_provider(&self) -> Result<Arc<dyn Provider>> {
            Ok(Arc::new(PortProvider(format!("{}:{}", self.host, self.port))))
        }

        fn id(&self) -> String {
            format!("port:{}:{}:{}", self.host, self.port, self.tls)
        }

        fn clone_box(&self) -> Box<dyn ProviderConfig> {
            Box::new(self.clone())
        }

        fn to_value(&self) -> Result<serde_yaml::Value> {
            to_yaml_value(self)
        }
    }

    #[tokio::test]
    async fn test_serde_kind_keeps_non_string_types() {
        let raw: serde_yaml::Value =
            serde_yaml::from_str("{host: db.internal, port: 5432, tls: true}").unwrap();
        let config = SerdeKind::<PortConfig>::new().parse(raw).unwrap();
        assert_eq!(config.id(), "port:db.internal:5432:true");

        let provider = config.new_provider().unwrap();
        assert_eq!(provider.fetch_secret().await.unwrap(), "db.internal:5432");
    }

    #[test]
    fn test_serde_kind_reports_type_errors() {
        let raw: serde_yaml::Value =
            serde_yaml::from_str("{host: db, port: not-a-number, tls: false}").unwrap();
        let err = SerdeKind::<PortConfig>::new().parse(raw).unwrap_err();
        assert!(matches!(err, SecretsError::InvalidProviderConfig { .. }));
    }

    #[test]
    fn test_boxed_config_clone_is_independent() {
        let config: Box<dyn ProviderConfig> =
            Box::new(PortConfig { host: "a".into(), port: 1, tls: false });
        let cloned = config.clone();
        assert_eq!(config.id(), cloned.id());
        assert!(!cloned.is_sensitive());
    }
}
