//! File secrets: the full contents of a file, re-read on every fetch.

use crate::secrets::error::{Result, SecretsError};
use crate::secrets::provider::{to_yaml_value, Provider, ProviderConfig};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Configuration of the file provider.
///
/// Accepted shapes: `file: {path: /etc/secret}` or the shorthand `file: /etc/secret`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileProviderConfig {
    pub path: PathBuf,
}

impl FileProviderConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl<'de> Deserialize<'de> for FileProviderConfig {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Full {
            path: PathBuf,
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Shape {
            Path(PathBuf),
            Full(Full),
        }

        match Shape::deserialize(deserializer)? {
            Shape::Path(path) | Shape::Full(Full { path }) => {
                if path.as_os_str().is_empty() {
                    return Err(serde::de::Error::custom("file path must not be empty"));
                }
                Ok(Self { path })
            }
        }
    }
}

impl ProviderConfig for FileProviderConfig {
    fn new_provider(&self) -> Result<Arc<dyn Provider>> {
        Ok(Arc::new(FileProvider { path: self.path.clone() }))
    }

    fn id(&self) -> String {
        format!("file:{}", self.path.display())
    }

    fn clone_box(&self) -> Box<dyn ProviderConfig> {
        Box::new(self.clone())
    }

    fn to_value(&self) -> Result<serde_yaml::Value> {
        to_yaml_value(self)
    }
}

/// Reads the configured file on each fetch.
#[derive(Debug)]
pub struct FileProvider {
    path: PathBuf,
}

#[async_trait]
impl Provider for FileProvider {
    async fn fetch_secret(&self) -> Result<String> {
        debug!(path = %self.path.display(), "Reading secret file");
        tokio::fs::read_to_string(&self.path).await.map_err(|e| SecretsError::io(&self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_file_fetch_rereads_contents() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "v1").unwrap();

        let provider = FileProviderConfig::new(file.path()).new_provider().unwrap();
        assert_eq!(provider.fetch_secret().await.unwrap(), "v1");

        std::fs::write(file.path(), "v2").unwrap();
        assert_eq!(provider.fetch_secret().await.unwrap(), "v2");
    }

    #[tokio::test]
    async fn test_missing_file_is_a_fetch_error() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FileProviderConfig::new(dir.path().join("absent")).new_provider().unwrap();

        let err = provider.fetch_secret().await.unwrap_err();
        assert!(matches!(err, SecretsError::Io { .. }));
        assert!(!err.is_structural());
        assert!(err.to_string().contains("absent"));
    }

    #[test]
    fn test_file_config_accepts_both_shapes() {
        let full: FileProviderConfig = serde_yaml::from_str("path: /etc/secret").unwrap();
        let short: FileProviderConfig = serde_yaml::from_str("/etc/secret").unwrap();
        assert_eq!(full, short);
        assert_eq!(full.id(), "file:/etc/secret");
    }

    #[test]
    fn test_file_config_rejects_unknown_and_empty() {
        assert!(serde_yaml::from_str::<FileProviderConfig>("{path: /a, mode: 600}").is_err());
        assert!(serde_yaml::from_str::<FileProviderConfig>("\"\"").is_err());
    }

    #[test]
    fn test_file_config_marshals_path() {
        let value = FileProviderConfig::new("/run/secrets/db").to_value().unwrap();
        assert_eq!(value, serde_yaml::from_str::<serde_yaml::Value>("path: /run/secrets/db").unwrap());
    }
}
