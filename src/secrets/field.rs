//! The secret-bearing configuration field.
//!
//! A [`Field`] is declared inside a configuration struct. Deserialization only
//! captures the raw value; the field becomes usable once a
//! [`Manager`](super::Manager) has discovered and resolved it:
//!
//! ```rust,ignore
//! #[derive(Deserialize)]
//! struct Config {
//!     api_key: Field,
//! }
//! config_secrets::walk_fields!(Config { api_key });
//!
//! let config: Config = serde_yaml::from_str("api_key: {file: /run/secrets/key}")?;
//! let manager = Manager::new(&config, ManagerOptions::default()).await?;
//! let key = config.api_key.value();
//! ```
//!
//! Clones of a field share its resolution.

use super::managed::ManagedSecret;
use super::marshal::{default_marshal_policy, redact_raw, MarshalPolicy};
use super::parse::ParsedField;
use super::types::{SecretStatus, SecretString};
use super::validate::SecretValidator;
use super::walk::Walk;
use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Notify;

/// Panic message for reading a field no manager has resolved.
pub const UNRESOLVED_FIELD_PANIC: &str = "secret field used before it was resolved: \
     pass the enclosing configuration to Manager::new or Manager::populate_config first";

/// A configuration value that holds a secret.
#[derive(Clone, Default)]
pub struct Field {
    raw: Option<Value>,
    slot: Arc<FieldSlot>,
}

#[derive(Default)]
struct FieldSlot {
    binding: RwLock<Option<Arc<FieldBinding>>>,
    validator: RwLock<Option<Arc<dyn SecretValidator>>>,
}

/// Resolution of a field by a manager.
pub(crate) struct FieldBinding {
    pub(crate) path: String,
    pub(crate) parsed: ParsedField,
    pub(crate) secret: Arc<ManagedSecret>,
    pub(crate) wake: Arc<Notify>,
    pub(crate) marshal_policy: Option<MarshalPolicy>,
}

impl Field {
    /// Create an unresolved field from raw configuration.
    pub fn from_raw(raw: Value) -> Self {
        Self { raw: Some(raw), slot: Arc::default() }
    }

    /// Create an unresolved inline field.
    pub fn inline(secret: impl Into<String>) -> Self {
        Self::from_raw(Value::String(secret.into()))
    }

    /// The raw configuration captured at deserialization.
    pub fn raw(&self) -> Option<&Value> {
        self.raw.as_ref()
    }

    /// Current secret value.
    ///
    /// Never blocks. Returns the most recently promoted value, the field's
    /// `default` while no value has been fetched yet, or an empty string.
    ///
    /// # Panics
    ///
    /// Panics with [`UNRESOLVED_FIELD_PANIC`] if no manager has resolved the field.
    pub fn value(&self) -> String {
        self.get().expose_secret().to_string()
    }

    /// Like [`value`](Self::value), wrapped in a redacting [`SecretString`].
    ///
    /// # Panics
    ///
    /// Panics with [`UNRESOLVED_FIELD_PANIC`] if no manager has resolved the field.
    pub fn get(&self) -> SecretString {
        let binding = self.resolved();
        binding
            .secret
            .current()
            .or_else(|| binding.parsed.settings.default.clone())
            .unwrap_or_default()
    }

    /// Ask the manager to re-fetch this secret now. Does not wait for the fetch.
    ///
    /// # Panics
    ///
    /// Panics with [`UNRESOLVED_FIELD_PANIC`] if no manager has resolved the field.
    pub fn trigger_refresh(&self) {
        let binding = self.resolved();
        binding.secret.request_refresh();
        binding.wake.notify_one();
    }

    /// Gate future rotations of this secret behind `validator`.
    ///
    /// May be called before or after resolution. Fields sharing a secret share
    /// its validator; the most recently set one applies.
    pub fn set_validator(&self, validator: Arc<dyn SecretValidator>) {
        *self.slot.validator.write() = Some(Arc::clone(&validator));
        if let Some(binding) = self.binding() {
            binding.secret.set_validator(Some(validator));
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.slot.binding.read().is_some()
    }

    /// Structural path the field was discovered at.
    pub fn path(&self) -> Option<String> {
        self.binding().map(|b| b.path.clone())
    }

    /// Registry name of the provider backing the field.
    pub fn provider_name(&self) -> Option<String> {
        self.binding().map(|b| b.parsed.provider_name().to_string())
    }

    pub fn status(&self) -> Option<SecretStatus> {
        self.binding().map(|b| b.secret.status())
    }

    pub(crate) fn validator(&self) -> Option<Arc<dyn SecretValidator>> {
        self.slot.validator.read().clone()
    }

    pub(crate) fn bind(&self, binding: Arc<FieldBinding>) {
        *self.slot.binding.write() = Some(binding);
    }

    fn binding(&self) -> Option<Arc<FieldBinding>> {
        self.slot.binding.read().clone()
    }

    fn resolved(&self) -> Arc<FieldBinding> {
        match self.binding() {
            Some(binding) => binding,
            None => panic!("{}", UNRESOLVED_FIELD_PANIC),
        }
    }
}

impl Walk for Field {}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let binding = self.binding();
        f.debug_struct("Field")
            .field("path", &binding.as_ref().map(|b| b.path.as_str()))
            .field("provider", &binding.as_ref().map(|b| b.parsed.provider_name()))
            .field("resolved", &binding.is_some())
            .finish()
    }
}

impl<'de> Deserialize<'de> for Field {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(Self::from_raw)
    }
}

impl Serialize for Field {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let value = match self.binding() {
            Some(binding) => {
                let policy = binding.marshal_policy.unwrap_or_else(default_marshal_policy);
                binding.parsed.marshal(policy).map_err(serde::ser::Error::custom)?
            }
            None => match &self.raw {
                Some(raw) if default_marshal_policy().redacts() => redact_raw(raw),
                Some(raw) => raw.clone(),
                None => Value::Null,
            },
        };
        value.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::marshal::REDACTED_PLACEHOLDER;

    #[derive(Deserialize, Serialize)]
    struct Config {
        token: Field,
        password: Field,
    }

    #[test]
    fn test_deserialize_captures_raw() {
        let config: Config =
            serde_yaml::from_str("token: hunter2\npassword: {file: {path: /etc/pw}}\n").unwrap();
        assert_eq!(config.token.raw(), Some(&Value::String("hunter2".into())));
        assert!(config.password.raw().is_some_and(Value::is_mapping));
        assert!(!config.token.is_resolved());
        assert_eq!(config.token.path(), None);
        assert_eq!(config.token.status(), None);
    }

    #[test]
    fn test_deserialize_from_json() {
        let config: Config =
            serde_json::from_str(r#"{"token": "abc", "password": {"file": "/etc/pw"}}"#).unwrap();
        assert_eq!(config.token.raw(), Some(&Value::String("abc".into())));
    }

    #[test]
    #[should_panic(expected = "used before it was resolved")]
    fn test_value_panics_when_unresolved() {
        Field::inline("hunter2").value();
    }

    #[test]
    #[should_panic(expected = "used before it was resolved")]
    fn test_trigger_refresh_panics_when_unresolved() {
        Field::inline("hunter2").trigger_refresh();
    }

    #[test]
    fn test_unresolved_serialization_redacts_by_shape() {
        let config: Config = serde_yaml::from_str("token: hunter2\npassword: {file: /etc/pw}\n").unwrap();
        let out = serde_yaml::to_string(&config).unwrap();
        assert!(!out.contains("hunter2"));
        assert!(out.contains(REDACTED_PLACEHOLDER));
        assert!(out.contains("/etc/pw"));
    }

    #[test]
    fn test_debug_hides_raw() {
        let field = Field::inline("hunter2");
        let debug_output = format!("{:?}", field);
        assert!(!debug_output.contains("hunter2"));
        assert!(debug_output.contains("resolved: false"));
    }

    #[test]
    fn test_clones_share_slot() {
        let field = Field::inline("x");
        let clone = field.clone();
        assert!(Arc::ptr_eq(&field.slot, &clone.slot));
    }
}
