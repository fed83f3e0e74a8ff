//! Configuration for the object store backend and client
//!
//! Loaded from a TOML file or from environment variables:
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | OBJSTORE_CRUD_BUCKET | - | Bucket name (required) |
//! | OBJSTORE_CRUD_BACKEND | memory | memory, gcs, or s3 |
//! | OBJSTORE_CRUD_FILENAME_FORMAT | %s.json | Key to object path template |
//! | OBJSTORE_CRUD_CONTENT_TYPE | application/json | MIME type stamped on writes |
//! | OBJSTORE_CRUD_TIMEOUT_MS | - | Per-call deadline |
//! | OBJSTORE_CRUD_ENDPOINT | - | S3-compatible endpoint URL |
//! | AWS_REGION | - | S3 region |
//!
//! Credentials are read by the backends themselves (`GOOGLE_*`, `AWS_*`).

use crate::storage::object_store::{InMemoryObjectStore, ObjectStore};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_FILENAME_FORMAT: &str = "%s.json";
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Error type for configuration loading and backend construction
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("missing required setting: {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
    #[error("backend {0} is not compiled in (enable the matching cargo feature)")]
    BackendUnavailable(BackendKind),
    #[error("failed to build backend: {0}")]
    Backend(#[source] crate::storage::StoreError),
}

/// Type of object store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Process-local store (tests, demos)
    #[default]
    Memory,
    /// Google Cloud Storage
    Gcs,
    /// Amazon S3 or compatible
    S3,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Memory => write!(f, "memory"),
            BackendKind::Gcs => write!(f, "gcs"),
            BackendKind::S3 => write!(f, "s3"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(BackendKind::Memory),
            "gcs" | "gcp" => Ok(BackendKind::Gcs),
            "s3" | "aws" => Ok(BackendKind::S3),
            _ => Err(ConfigError::Invalid {
                name: "backend",
                value: s.to_string(),
            }),
        }
    }
}

/// Store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Bucket name
    pub bucket: String,
    /// Backend type
    pub backend: BackendKind,
    /// Filename template with a single `%s` for the key
    pub filename_format: String,
    /// MIME type stamped on every write
    pub content_type: String,
    /// Per-call deadline in milliseconds
    pub op_timeout_ms: Option<u64>,
    /// Region (S3)
    pub region: Option<String>,
    /// Custom endpoint (S3-compatible services like MinIO)
    pub endpoint: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            bucket: String::new(),
            backend: BackendKind::Memory,
            filename_format: DEFAULT_FILENAME_FORMAT.to_string(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            op_timeout_ms: None,
            region: None,
            endpoint: None,
        }
    }
}

impl StoreConfig {
    /// In-memory configuration (for tests)
    pub fn memory(bucket: &str) -> Self {
        StoreConfig {
            bucket: bucket.to_string(),
            ..Default::default()
        }
    }

    /// Parse a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: StoreConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = StoreConfig::default();
        let op_timeout_ms = match lookup("OBJSTORE_CRUD_TIMEOUT_MS") {
            Some(value) => Some(value.parse().map_err(|_| ConfigError::Invalid {
                name: "OBJSTORE_CRUD_TIMEOUT_MS",
                value,
            })?),
            None => None,
        };

        let config = StoreConfig {
            bucket: lookup("OBJSTORE_CRUD_BUCKET").ok_or(ConfigError::Missing("OBJSTORE_CRUD_BUCKET"))?,
            backend: match lookup("OBJSTORE_CRUD_BACKEND") {
                Some(value) => value.parse()?,
                None => defaults.backend,
            },
            filename_format: lookup("OBJSTORE_CRUD_FILENAME_FORMAT")
                .unwrap_or(defaults.filename_format),
            content_type: lookup("OBJSTORE_CRUD_CONTENT_TYPE").unwrap_or(defaults.content_type),
            op_timeout_ms,
            region: lookup("AWS_REGION"),
            endpoint: lookup("OBJSTORE_CRUD_ENDPOINT"),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket.is_empty() {
            return Err(ConfigError::Missing("bucket"));
        }
        if self.content_type.is_empty() {
            return Err(ConfigError::Invalid {
                name: "content_type",
                value: self.content_type.clone(),
            });
        }
        Ok(())
    }

    /// Per-call deadline
    pub fn op_timeout(&self) -> Option<Duration> {
        self.op_timeout_ms.map(Duration::from_millis)
    }

    /// Build the configured backend
    pub fn open_backend(&self) -> Result<Arc<dyn ObjectStore>, ConfigError> {
        match self.backend {
            BackendKind::Memory => Ok(Arc::new(InMemoryObjectStore::new())),
            #[cfg(feature = "gcp")]
            BackendKind::Gcs => {
                let store = crate::storage::CloudObjectStore::gcs(&self.bucket)
                    .map_err(ConfigError::Backend)?;
                Ok(Arc::new(store))
            }
            #[cfg(feature = "aws")]
            BackendKind::S3 => {
                let store = crate::storage::CloudObjectStore::s3(
                    &self.bucket,
                    self.region.as_deref(),
                    self.endpoint.as_deref(),
                )
                .map_err(ConfigError::Backend)?;
                Ok(Arc::new(store))
            }
            #[allow(unreachable_patterns)]
            other => Err(ConfigError::BackendUnavailable(other)),
        }
    }
}
