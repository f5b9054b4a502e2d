//! Raw field configuration -> provider selection and settings.
//!
//! A field is either a bare scalar (inline shorthand) or a mapping holding exactly
//! one registered provider key plus optional settings:
//!
//! ```yaml
//! api_key: "xyz"
//! password:
//!   file: {path: /etc/secret}
//!   refreshInterval: 5m
//!   default: changeme
//! ```

use super::error::{Result, SecretsError};
use super::marshal::{placeholder, MarshalPolicy};
use super::provider::ProviderConfig;
use super::providers::InlineProviderConfig;
use super::registry::ProviderRegistry;
use super::types::SecretString;
use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::fmt;
use std::time::Duration;

/// Setting key for the refresh interval.
pub const REFRESH_INTERVAL_KEY: &str = "refreshInterval";
/// Setting key for the fallback value.
pub const DEFAULT_KEY: &str = "default";

const SETTING_KEYS: [&str; 2] = [REFRESH_INTERVAL_KEY, DEFAULT_KEY];

/// Where a field's value comes from.
#[derive(Debug, Clone)]
pub enum SecretSource {
    /// Bare scalar shorthand.
    Inline(SecretString),
    /// A registered provider and its parsed configuration.
    Provider { name: String, config: Box<dyn ProviderConfig> },
}

/// Generic settings that can sit next to any provider key.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSettings {
    /// How often to re-fetch; the manager default applies when unset.
    #[serde(default, deserialize_with = "deserialize_interval")]
    pub refresh_interval: Option<Duration>,
    /// Returned by the field until the provider has produced a value.
    #[serde(default)]
    pub default: Option<SecretString>,
}

/// A fully parsed field.
#[derive(Debug, Clone)]
pub struct ParsedField {
    pub source: SecretSource,
    pub settings: FieldSettings,
}

impl ParsedField {
    /// Registry name of the selected provider.
    pub fn provider_name(&self) -> &str {
        match &self.source {
            SecretSource::Inline(_) => super::providers::INLINE,
            SecretSource::Provider { name, .. } => name,
        }
    }

    /// Typed provider configuration, building one for the inline shorthand.
    pub fn provider_config(&self) -> Box<dyn ProviderConfig> {
        match &self.source {
            SecretSource::Inline(secret) => Box::new(InlineProviderConfig::new(secret.expose_secret())),
            SecretSource::Provider { config, .. } => config.clone(),
        }
    }

    /// Serialize back to configuration form under `policy`.
    pub fn marshal(&self, policy: MarshalPolicy) -> Result<Value> {
        let redact = policy.redacts();
        match &self.source {
            SecretSource::Inline(secret) => Ok(if redact {
                placeholder()
            } else {
                Value::String(secret.expose_secret().to_string())
            }),
            SecretSource::Provider { name, config } => {
                let mut map = Mapping::new();
                let value = if redact && config.is_sensitive() { placeholder() } else { config.to_value()? };
                map.insert(Value::String(name.clone()), value);

                if let Some(interval) = self.settings.refresh_interval {
                    map.insert(
                        Value::String(REFRESH_INTERVAL_KEY.into()),
                        Value::String(humantime::format_duration(interval).to_string()),
                    );
                }
                if let Some(default) = &self.settings.default {
                    let value = if redact {
                        placeholder()
                    } else {
                        Value::String(default.expose_secret().to_string())
                    };
                    map.insert(Value::String(DEFAULT_KEY.into()), value);
                }
                Ok(Value::Mapping(map))
            }
        }
    }
}

/// Parse the raw configuration of the field at `path`.
pub fn parse_field(raw: &Value, registry: &ProviderRegistry, path: &str) -> Result<ParsedField> {
    match raw {
        Value::String(s) => Ok(inline(s.clone())),
        Value::Number(n) => Ok(inline(n.to_string())),
        Value::Bool(b) => Ok(inline(b.to_string())),
        Value::Mapping(map) => parse_mapping(map, registry, path),
        Value::Null => Err(SecretsError::invalid_shape(path, "secret is empty")),
        Value::Sequence(_) => {
            Err(SecretsError::invalid_shape(path, "expected a string or a mapping, found a sequence"))
        }
        Value::Tagged(tagged) => Err(SecretsError::invalid_shape(
            path,
            format!("expected a string or a mapping, found tagged value {}", tagged.tag),
        )),
    }
}

fn inline(secret: String) -> ParsedField {
    ParsedField { source: SecretSource::Inline(SecretString::new(secret)), settings: FieldSettings::default() }
}

fn parse_mapping(map: &Mapping, registry: &ProviderRegistry, path: &str) -> Result<ParsedField> {
    let mut providers: Vec<(&str, &Value)> = Vec::new();
    let mut settings = Mapping::new();

    for (key, value) in map {
        let key_str = key
            .as_str()
            .ok_or_else(|| SecretsError::invalid_shape(path, format!("non-string key {:?}", key)))?;

        if registry.contains(key_str) {
            providers.push((key_str, value));
        } else if SETTING_KEYS.contains(&key_str) {
            settings.insert(key.clone(), value.clone());
        } else {
            return Err(SecretsError::UnknownSetting { path: path.to_string(), key: key_str.to_string() });
        }
    }

    let (name, section) = match providers.as_slice() {
        [] => {
            return Err(SecretsError::NoProvider {
                path: path.to_string(),
                known: registry.names().join(", "),
            })
        }
        [single] => *single,
        many => {
            let mut names: Vec<&str> = many.iter().map(|(name, _)| *name).collect();
            names.sort_unstable();
            return Err(SecretsError::AmbiguousProvider { path: path.to_string(), names: names.join(", ") });
        }
    };

    let config = registry.parse(name, section.clone()).map_err(|e| e.at_path(path))?;

    let settings: FieldSettings = serde_yaml::from_value(Value::Mapping(settings))
        .map_err(|e| SecretsError::invalid_settings(path, e.to_string()))?;
    if settings.refresh_interval == Some(Duration::ZERO) {
        return Err(SecretsError::invalid_settings(path, "refreshInterval must be greater than zero"));
    }

    Ok(ParsedField { source: SecretSource::Provider { name: name.to_string(), config }, settings })
}

/// Accepts a humantime string (`90s`, `5m`, `1h 30m`) or an integer number of seconds.
fn deserialize_interval<'de, D>(deserializer: D) -> std::result::Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct IntervalVisitor;

    impl<'de> Visitor<'de> for IntervalVisitor {
        type Value = Option<Duration>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a duration such as \"5m\" or a number of seconds")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Self::Value, E> {
            humantime::parse_duration(v).map(Some).map_err(E::custom)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Self::Value, E> {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Self::Value, E> {
            u64::try_from(v)
                .map(|secs| Some(Duration::from_secs(secs)))
                .map_err(|_| E::custom("refreshInterval must not be negative"))
        }

        fn visit_unit<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_none<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
            Ok(None)
        }
    }

    deserializer.deserialize_any(IntervalVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::providers::FileProviderConfig;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    fn registry() -> ProviderRegistry {
        ProviderRegistry::with_builtins()
    }

    #[test]
    fn test_bare_string_is_inline() {
        let parsed = parse_field(&yaml("hunter2"), &registry(), "Config.token").unwrap();
        assert_eq!(parsed.provider_name(), "inline");
        assert!(matches!(&parsed.source, SecretSource::Inline(s) if s == "hunter2"));
        assert_eq!(parsed.settings, FieldSettings::default());
    }

    #[test]
    fn test_numeric_scalar_is_inline() {
        let parsed = parse_field(&yaml("12345"), &registry(), "Config.pin").unwrap();
        assert!(matches!(&parsed.source, SecretSource::Inline(s) if s == "12345"));
    }

    #[test]
    fn test_provider_with_settings() {
        let raw = yaml("{file: {path: /etc/secret}, refreshInterval: 5m, default: fallback}");
        let parsed = parse_field(&raw, &registry(), "Config.password").unwrap();

        assert_eq!(parsed.provider_name(), "file");
        assert_eq!(parsed.provider_config().id(), FileProviderConfig::new("/etc/secret").id());
        assert_eq!(parsed.settings.refresh_interval, Some(Duration::from_secs(300)));
        assert!(parsed.settings.default.as_ref().is_some_and(|d| d == "fallback"));
    }

    #[test]
    fn test_interval_in_seconds() {
        let parsed = parse_field(&yaml("{file: /a, refreshInterval: 90}"), &registry(), "C.f").unwrap();
        assert_eq!(parsed.settings.refresh_interval, Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_no_provider_lists_known_names() {
        let err = parse_field(&yaml("{default: x}"), &registry(), "Config.db").unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, SecretsError::NoProvider { .. }));
        assert!(msg.contains("Config.db"));
        assert!(msg.contains("file, inline"));
    }

    #[test]
    fn test_multiple_providers_rejected() {
        let err = parse_field(&yaml("{file: /a, inline: b}"), &registry(), "Config.db").unwrap_err();
        assert!(matches!(err, SecretsError::AmbiguousProvider { ref names, .. } if names == "file, inline"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = parse_field(&yaml("{vault: {path: a}}"), &registry(), "Config.db").unwrap_err();
        assert!(matches!(err, SecretsError::UnknownSetting { ref key, .. } if key == "vault"));
    }

    #[test]
    fn test_bad_provider_section_names_provider_and_path() {
        let err = parse_field(&yaml("{file: {path: /a, mode: 1}}"), &registry(), "Config.db").unwrap_err();
        match err {
            SecretsError::InvalidProviderConfig { provider, path, .. } => {
                assert_eq!(provider, "file");
                assert_eq!(path, "Config.db");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bad_settings() {
        let err = parse_field(&yaml("{file: /a, refreshInterval: soon}"), &registry(), "C.f").unwrap_err();
        assert!(matches!(err, SecretsError::InvalidSettings { .. }));

        let err = parse_field(&yaml("{file: /a, refreshInterval: 0}"), &registry(), "C.f").unwrap_err();
        assert!(matches!(err, SecretsError::InvalidSettings { .. }));
    }

    #[test]
    fn test_invalid_shapes() {
        for raw in ["~", "[a, b]"] {
            let err = parse_field(&yaml(raw), &registry(), "C.f").unwrap_err();
            assert!(matches!(err, SecretsError::InvalidShape { .. }), "{raw}");
        }
    }

    #[test]
    fn test_marshal_redacts_inline_and_default() {
        let parsed = parse_field(&yaml("hunter2"), &registry(), "C.f").unwrap();
        assert_eq!(parsed.marshal(MarshalPolicy::Redact).unwrap(), placeholder());
        assert_eq!(parsed.marshal(MarshalPolicy::ExposeInline).unwrap(), yaml("hunter2"));

        let parsed = parse_field(&yaml("{inline: hunter2}"), &registry(), "C.f").unwrap();
        assert_eq!(parsed.marshal(MarshalPolicy::Redact).unwrap()["inline"], placeholder());

        let parsed =
            parse_field(&yaml("{file: {path: /etc/s}, default: d, refreshInterval: 1m}"), &registry(), "C.f")
                .unwrap();
        let out = parsed.marshal(MarshalPolicy::Redact).unwrap();
        assert_eq!(out["file"], yaml("path: /etc/s"));
        assert_eq!(out["default"], placeholder());
        assert_eq!(out["refreshInterval"], yaml("1m"));
    }
}
