//! YAML configuration for the barangay lifecycle.
//!
//! All sections are optional; a file with only `version` yields an
//! in-memory deployment with the default category registry.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! version: "1.0"
//! name: "Barangay San Isidro"
//!
//! records:
//!   max_attachments: 3
//!   strip_control_chars: true
//!   categories:
//!     "Barangay ID":
//!       - { name: precinct, label: Precinct Number, type: number, required: true }
//!
//! store:
//!   backend: redb
//!   path: /var/lib/barangay/requests.redb
//!
//! media:
//!   backend: http
//!   upload_url: https://api.cloudinary.com/v1_1/demo/auto/upload
//!   upload_preset: abis_unsigned
//!
//! lifecycle:
//!   upload_timeout_ms: 120000
//!   write_retries: 3
//!   codes:
//!     tracking_prefix: "ABIS-"
//!
//! fallback:
//!   path: /var/lib/barangay/outbox.redb
//!   capacity: 500
//! ```
//!
//! Categories listed under `records.categories` are merged into the default
//! registry unless `replace_categories: true` is set.

use std::fs;
use std::path::Path;
use std::time::Duration;

use records::{CategoryRegistry, RecordsConfig};
use serde::{Deserialize, Serialize};
use store::{BackendConfig, MediaConfig};
use thiserror::Error;

use crate::codes::CodeConfig;

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

/// Knobs of the lifecycle manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Deadline for a single media upload. Default: 120 s.
    pub upload_timeout_ms: u64,
    /// Largest accepted upload. Default: 10 MiB.
    pub max_upload_bytes: usize,
    /// Extra read-modify-write rounds when a mutation without an expected
    /// version loses a race. Default: `3`.
    pub write_retries: u32,
    /// Fresh code sets tried when an insert reports a duplicate code.
    pub create_retries: u32,
    pub codes: CodeConfig,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            upload_timeout_ms: 120_000,
            max_upload_bytes: 10 * 1024 * 1024,
            write_retries: 3,
            create_retries: 3,
            codes: CodeConfig::default(),
        }
    }
}

impl LifecycleConfig {
    pub fn upload_timeout(&self) -> Duration {
        Duration::from_millis(self.upload_timeout_ms)
    }

    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.upload_timeout_ms == 0 {
            return Err(ConfigLoadError::Validation(
                "lifecycle.upload_timeout_ms must be > 0".into(),
            ));
        }
        if self.max_upload_bytes == 0 {
            return Err(ConfigLoadError::Validation(
                "lifecycle.max_upload_bytes must be > 0".into(),
            ));
        }
        self.codes
            .validate()
            .map_err(|e| ConfigLoadError::Validation(format!("lifecycle.codes: {e}")))
    }
}

/// Local fallback queue. Without a `path` the queue is disabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub path: Option<String>,
    pub capacity: usize,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            path: None,
            capacity: 500,
        }
    }
}

/// Records section as written in YAML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordsYamlConfig {
    #[serde(flatten)]
    pub base: RecordsConfig,
    /// Use `categories` as the whole registry instead of merging it into
    /// the default one.
    pub replace_categories: bool,
}

impl RecordsYamlConfig {
    pub fn resolve(&self) -> RecordsConfig {
        let mut cfg = self.base.clone();
        if !self.replace_categories {
            let mut registry = CategoryRegistry::default();
            registry.merge(cfg.categories);
            cfg.categories = registry;
        }
        cfg
    }
}

/// Top-level YAML configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BarangayConfig {
    /// Configuration format version
    pub version: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub records: RecordsYamlConfig,

    #[serde(default)]
    pub store: BackendConfig,

    #[serde(default)]
    pub media: MediaConfig,

    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    #[serde(default)]
    pub fallback: FallbackConfig,
}

impl BarangayConfig {
    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: BarangayConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        self.records
            .resolve()
            .validate()
            .map_err(|e| ConfigLoadError::Validation(format!("records: {e}")))?;
        self.lifecycle.validate()?;

        if self.fallback.path.is_some() && self.fallback.capacity == 0 {
            return Err(ConfigLoadError::Validation(
                "fallback.capacity must be > 0 when a path is set".into(),
            ));
        }
        if let BackendConfig::Redb { path } = &self.store {
            if self.fallback.path.as_deref() == Some(path.as_str()) {
                return Err(ConfigLoadError::Validation(
                    "fallback.path must differ from store.path".into(),
                ));
            }
        }
        Ok(())
    }
}

impl Default for BarangayConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: None,
            records: RecordsYamlConfig::default(),
            store: BackendConfig::default(),
            media: MediaConfig::default(),
            lifecycle: LifecycleConfig::default(),
            fallback: FallbackConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn minimal_yaml_uses_defaults() {
        let config = BarangayConfig::from_yaml("version: \"1.0\"\n").unwrap();
        assert_eq!(config.store, BackendConfig::InMemory);
        assert_eq!(config.lifecycle.upload_timeout(), Duration::from_secs(120));
        assert_eq!(config.records.resolve().categories.len(), 12);
        assert!(config.fallback.path.is_none());
    }

    #[test]
    fn load_from_file() {
        let yaml = r#"
version: "1.0"
name: "Barangay San Isidro"
store:
  backend: redb
  path: /tmp/requests.redb
fallback:
  path: /tmp/outbox.redb
  capacity: 10
"#;
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml.as_bytes()).unwrap();

        let config = BarangayConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.name.as_deref(), Some("Barangay San Isidro"));
        assert_eq!(config.store, BackendConfig::redb("/tmp/requests.redb"));
        assert_eq!(config.fallback.capacity, 10);
    }

    #[test]
    fn unsupported_version_rejected() {
        let err = BarangayConfig::from_yaml("version: \"2.0\"\n").unwrap_err();
        assert!(matches!(err, ConfigLoadError::UnsupportedVersion(v) if v == "2.0"));
    }

    #[test]
    fn custom_categories_merge_or_replace() {
        let yaml = r#"
version: "1.0"
records:
  max_attachments: 2
  categories:
    "Barangay ID":
      - { name: precinct, label: Precinct Number, type: number, required: true }
"#;
        let merged = BarangayConfig::from_yaml(yaml).unwrap().records.resolve();
        assert_eq!(merged.max_attachments, 2);
        assert_eq!(merged.categories.len(), 13);

        let replaced = BarangayConfig::from_yaml(&format!("{yaml}  replace_categories: true\n"))
            .unwrap()
            .records
            .resolve();
        assert_eq!(replaced.categories.len(), 1);
    }

    #[test]
    fn shared_store_and_fallback_path_rejected() {
        let yaml = r#"
version: "1.0"
store:
  backend: redb
  path: /tmp/same.redb
fallback:
  path: /tmp/same.redb
"#;
        let err = BarangayConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("fallback.path"));
    }

    #[test]
    fn zero_upload_timeout_rejected() {
        let yaml = "version: \"1.0\"\nlifecycle:\n  upload_timeout_ms: 0\n";
        assert!(BarangayConfig::from_yaml(yaml).is_err());
    }
}
