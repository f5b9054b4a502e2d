//! Provider registry
//!
//! Maps provider type names (the keys used in configuration, e.g. `file`) to the
//! [`ProviderKind`] that parses their configuration. A process-wide default
//! registry carries the built-in providers; every API that resolves fields also
//! accepts an explicit registry so tests and isolated subsystems stay independent.

use super::error::{Result, SecretsError};
use super::provider::{ProviderConfig, ProviderKind, SerdeKind};
use super::providers::{FileProviderConfig, InlineProviderConfig, FILE, INLINE};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

static DEFAULT_REGISTRY: Lazy<Arc<ProviderRegistry>> =
    Lazy::new(|| Arc::new(ProviderRegistry::with_builtins()));

/// The process-wide registry, pre-populated with `inline` and `file`.
pub fn default_registry() -> Arc<ProviderRegistry> {
    Arc::clone(&DEFAULT_REGISTRY)
}

/// Name -> provider kind map.
pub struct ProviderRegistry {
    kinds: RwLock<BTreeMap<String, Arc<dyn ProviderKind>>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry").field("providers", &self.names()).finish()
    }
}

impl ProviderRegistry {
    /// Create a registry with no providers
    pub fn new() -> Self {
        Self { kinds: RwLock::new(BTreeMap::new()) }
    }

    /// Create a registry holding the built-in `inline` and `file` providers
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register::<InlineProviderConfig>(INLINE);
        registry.register::<FileProviderConfig>(FILE);
        registry
    }

    /// Register a serde-deserializable provider config type under `name`.
    ///
    /// # Panics
    ///
    /// Panics if `name` is already registered. Registration happens while wiring
    /// up a program, so a clash is a programming error.
    pub fn register<C>(&self, name: &str)
    where
        C: ProviderConfig + DeserializeOwned,
    {
        self.register_kind(name, Arc::new(SerdeKind::<C>::new()));
    }

    /// Register a custom parser under `name`.
    ///
    /// # Panics
    ///
    /// Panics if `name` is already registered.
    pub fn register_kind(&self, name: &str, kind: Arc<dyn ProviderKind>) {
        let mut kinds = self.kinds.write();
        if kinds.contains_key(name) {
            panic!("secret provider {:?} is already registered", name);
        }
        debug!(provider = %name, "Registering secret provider");
        kinds.insert(name.to_string(), kind);
    }

    /// Look up a provider kind by name
    pub fn get(&self, name: &str) -> Result<Arc<dyn ProviderKind>> {
        self.kinds.read().get(name).cloned().ok_or_else(|| SecretsError::unknown_provider(name))
    }

    /// Check if a provider is registered
    pub fn contains(&self, name: &str) -> bool {
        self.kinds.read().contains_key(name)
    }

    /// Registered provider names, sorted
    pub fn names(&self) -> Vec<String> {
        self.kinds.read().keys().cloned().collect()
    }

    /// Parse a provider's configuration section.
    pub fn parse(&self, name: &str, raw: serde_yaml::Value) -> Result<Box<dyn ProviderConfig>> {
        self.get(name)?.parse(raw).map_err(|e| match e {
            SecretsError::InvalidProviderConfig { path, message, .. } => {
                SecretsError::InvalidProviderConfig { provider: name.to_string(), path, message }
            }
            other => other,
        })
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creation() {
        let registry = ProviderRegistry::new();
        assert!(registry.names().is_empty());
        assert!(!registry.contains(INLINE));
    }

    #[test]
    fn test_builtins_registered() {
        let registry = ProviderRegistry::with_builtins();
        assert_eq!(registry.names(), vec!["file".to_string(), "inline".to_string()]);
        assert!(default_registry().contains(FILE));
    }

    #[test]
    fn test_unknown_provider() {
        let registry = ProviderRegistry::with_builtins();
        let err = registry.get("vault").err().unwrap();
        assert!(err.to_string().contains("unknown provider type: vault"));
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn test_duplicate_registration_panics() {
        let registry = ProviderRegistry::with_builtins();
        registry.register::<FileProviderConfig>(FILE);
    }

    #[test]
    fn test_parse_names_provider_in_errors() {
        let registry = ProviderRegistry::with_builtins();
        let raw: serde_yaml::Value = serde_yaml::from_str("{nope: 1}").unwrap();
        match registry.parse(FILE, raw).unwrap_err() {
            SecretsError::InvalidProviderConfig { provider, .. } => assert_eq!(provider, "file"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_debug_lists_providers() {
        let debug_output = format!("{:?}", ProviderRegistry::with_builtins());
        assert!(debug_output.contains("file"));
        assert!(debug_output.contains("inline"));
    }
}
