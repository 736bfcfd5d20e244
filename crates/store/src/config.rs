use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{InMemoryMedia, InMemoryStore, MediaError, MediaStore, RequestStore, StoreError};

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_upload_timeout_ms() -> u64 {
    120_000
}

/// Selects and builds a [`RequestStore`] backend.
///
/// ```yaml
/// store:
///   backend: redb
///   path: /var/lib/barangay/requests.redb
/// ```
///
/// # Example
/// ```
/// use store::BackendConfig;
///
/// let store = BackendConfig::in_memory().build().unwrap();
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Process-local map. Nothing survives a restart.
    #[default]
    InMemory,
    /// Embedded redb file. Requires the `backend-redb` feature.
    Redb { path: String },
    /// External HTTP backend. Requires the `backend-rest` feature.
    Rest {
        base_url: String,
        #[serde(default = "default_timeout_ms")]
        timeout_ms: u64,
    },
}

impl BackendConfig {
    pub fn in_memory() -> Self {
        BackendConfig::InMemory
    }

    pub fn redb<P: Into<String>>(path: P) -> Self {
        BackendConfig::Redb { path: path.into() }
    }

    pub fn rest<U: Into<String>>(base_url: U) -> Self {
        BackendConfig::Rest {
            base_url: base_url.into(),
            timeout_ms: default_timeout_ms(),
        }
    }

    pub fn build(&self) -> Result<Arc<dyn RequestStore>, StoreError> {
        match self {
            BackendConfig::InMemory => Ok(Arc::new(InMemoryStore::new())),
            BackendConfig::Redb { path } => {
                #[cfg(feature = "backend-redb")]
                {
                    Ok(Arc::new(crate::RedbStore::open(path)?))
                }
                #[cfg(not(feature = "backend-redb"))]
                {
                    let _ = path;
                    Err(StoreError::backend("redb backend disabled at compile time"))
                }
            }
            BackendConfig::Rest {
                base_url,
                timeout_ms,
            } => {
                #[cfg(feature = "backend-rest")]
                {
                    Ok(Arc::new(crate::RestStore::new(
                        base_url.clone(),
                        Duration::from_millis(*timeout_ms),
                    )?))
                }
                #[cfg(not(feature = "backend-rest"))]
                {
                    let _ = (base_url, timeout_ms);
                    Err(StoreError::backend("rest backend disabled at compile time"))
                }
            }
        }
    }
}

/// Selects and builds a [`MediaStore`] backend.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum MediaConfig {
    #[default]
    InMemory,
    /// Hosted media service taking unsigned uploads with a preset.
    Http {
        upload_url: String,
        upload_preset: String,
        #[serde(default = "default_upload_timeout_ms")]
        timeout_ms: u64,
    },
}

impl MediaConfig {
    pub fn build(&self) -> Result<Arc<dyn MediaStore>, MediaError> {
        match self {
            MediaConfig::InMemory => Ok(Arc::new(InMemoryMedia::new())),
            MediaConfig::Http {
                upload_url,
                upload_preset,
                timeout_ms,
            } => {
                #[cfg(feature = "backend-rest")]
                {
                    Ok(Arc::new(crate::HttpMediaStore::new(
                        upload_url.clone(),
                        upload_preset.clone(),
                        Duration::from_millis(*timeout_ms),
                    )?))
                }
                #[cfg(not(feature = "backend-rest"))]
                {
                    let _ = (upload_url, upload_preset, timeout_ms);
                    Err(MediaError::Unavailable(
                        "http media backend disabled at compile time".into(),
                    ))
                }
            }
        }
    }
}
