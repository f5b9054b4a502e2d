//! Inline secrets: the literal value lives in the configuration itself.

use crate::secrets::error::Result;
use crate::secrets::provider::{Provider, ProviderConfig};
use crate::secrets::types::SecretString;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use std::sync::Arc;

/// Prefix of inline identities. Identities never leave the manager.
const INLINE_ID_PREFIX: &str = "inline:";

/// Configuration of the inline provider: a bare string.
///
/// Accepted shapes: `token: "xyz"` (field shorthand) or `token: {inline: "xyz"}`.
#[derive(Clone, PartialEq, Eq)]
pub struct InlineProviderConfig {
    secret: SecretString,
}

impl InlineProviderConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: SecretString::new(secret) }
    }
}

impl std::fmt::Debug for InlineProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InlineProviderConfig").field("secret", &self.secret).finish()
    }
}

impl<'de> Deserialize<'de> for InlineProviderConfig {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secret = String::deserialize(deserializer)?;
        Ok(Self::new(secret))
    }
}

impl ProviderConfig for InlineProviderConfig {
    fn new_provider(&self) -> Result<Arc<dyn Provider>> {
        Ok(Arc::new(InlineProvider { secret: self.secret.clone() }))
    }

    fn id(&self) -> String {
        format!("{}{}", INLINE_ID_PREFIX, self.secret.expose_secret())
    }

    fn clone_box(&self) -> Box<dyn ProviderConfig> {
        Box::new(self.clone())
    }

    fn to_value(&self) -> Result<serde_yaml::Value> {
        Ok(serde_yaml::Value::String(self.secret.expose_secret().to_string()))
    }

    fn is_sensitive(&self) -> bool {
        true
    }
}

/// Returns the configured literal; never fails.
#[derive(Debug)]
pub struct InlineProvider {
    secret: SecretString,
}

#[async_trait]
impl Provider for InlineProvider {
    async fn fetch_secret(&self) -> Result<String> {
        Ok(self.secret.expose_secret().to_string())
    }
}
