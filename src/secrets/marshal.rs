//! Redaction policy for writing secret fields back out.

use serde_yaml::{Mapping, Value};
use std::sync::atomic::{AtomicU8, Ordering};

/// Emitted in place of any value that could reveal secret material.
pub const REDACTED_PLACEHOLDER: &str = "<secret>";

/// Whether serialized fields may reveal inline secrets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarshalPolicy {
    /// Inline literals and `default` values become [`REDACTED_PLACEHOLDER`].
    #[default]
    Redact,
    /// Everything is written verbatim. Meant for local debugging dumps.
    ExposeInline,
}

impl MarshalPolicy {
    fn as_u8(self) -> u8 {
        match self {
            Self::Redact => 0,
            Self::ExposeInline => 1,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::ExposeInline,
            _ => Self::Redact,
        }
    }

    pub fn redacts(self) -> bool {
        self == Self::Redact
    }
}

static DEFAULT_POLICY: AtomicU8 = AtomicU8::new(0);

/// Process-wide policy used by fields whose manager has no override.
pub fn default_marshal_policy() -> MarshalPolicy {
    MarshalPolicy::from_u8(DEFAULT_POLICY.load(Ordering::Relaxed))
}

/// Change the process-wide policy.
pub fn set_default_marshal_policy(policy: MarshalPolicy) {
    DEFAULT_POLICY.store(policy.as_u8(), Ordering::Relaxed);
}

pub(crate) fn placeholder() -> Value {
    Value::String(REDACTED_PLACEHOLDER.to_string())
}

/// Redact a raw, unresolved field using only its shape: bare scalars, the
/// `inline` key and `default` are replaced; other keys are kept.
pub(crate) fn redact_raw(raw: &Value) -> Value {
    match raw {
        Value::Mapping(map) => {
            let mut out = Mapping::new();
            for (key, value) in map {
                let sensitive = matches!(key.as_str(), Some(super::providers::INLINE) | Some("default"));
                out.insert(key.clone(), if sensitive { placeholder() } else { value.clone() });
            }
            Value::Mapping(out)
        }
        Value::Null => Value::Null,
        _ => placeholder(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_raw_shapes() {
        assert_eq!(redact_raw(&Value::String("hunter2".into())), placeholder());

        let raw: Value =
            serde_yaml::from_str("{file: {path: /etc/s}, default: fallback, refreshInterval: 5m}").unwrap();
        let redacted = redact_raw(&raw);
        assert_eq!(redacted["default"], placeholder());
        assert_eq!(redacted["file"]["path"], Value::String("/etc/s".into()));
        assert_eq!(redacted["refreshInterval"], Value::String("5m".into()));

        let raw: Value = serde_yaml::from_str("{inline: hunter2}").unwrap();
        assert_eq!(redact_raw(&raw)["inline"], placeholder());
    }

    #[test]
    fn test_policy_encoding() {
        for policy in [MarshalPolicy::Redact, MarshalPolicy::ExposeInline] {
            assert_eq!(MarshalPolicy::from_u8(policy.as_u8()), policy);
        }
        assert!(MarshalPolicy::default().redacts());
    }
}
