//! Object store abstraction used to source documents and persist artifacts.
//!
//! Paths are opaque `/`-separated strings. `list` performs a plain string-prefix match, the way
//! bucket listings do, and returns paths in lexicographic order.

mod gcs;
mod local;
mod memory;

pub use gcs::GcsObjectStore;
pub use local::LocalObjectStore;
pub use memory::MemoryObjectStore;

use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{Config, ConfigError, StorageBackend};

/// Content type used for every JSON artifact.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Errors returned by object store adapters.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No object exists at the requested path.
    #[error("object not found: {0}")]
    NotFound(String),
    /// Local filesystem access failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path being accessed.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// Path escapes the store root or is otherwise unusable.
    #[error("invalid object path: {0}")]
    InvalidPath(String),
    /// Endpoint URL could not be parsed.
    #[error("invalid storage URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Remote store answered with an unexpected status.
    #[error("Unexpected storage response ({status}): {body}")]
    UnexpectedStatus {
        /// Status returned by the remote store.
        status: StatusCode,
        /// Response body for diagnosis.
        body: String,
    },
}

/// Minimal read/write/list contract over a bucket-like store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Read an object's bytes.
    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Create or replace an object.
    async fn write(&self, path: &str, bytes: Vec<u8>, content_type: &str)
    -> Result<(), StorageError>;

    /// List object paths that start with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// Build the object store selected by configuration.
pub fn build_object_store(config: &Config) -> Result<Arc<dyn ObjectStore>, ConfigError> {
    match config.storage_backend {
        StorageBackend::Local => {
            tracing::debug!(root = %config.storage_root, "Using local object store");
            Ok(Arc::new(LocalObjectStore::new(&config.storage_root)))
        }
        StorageBackend::Gcs => {
            let bucket = config.require_bucket()?;
            tracing::debug!(bucket, endpoint = %config.storage_endpoint, "Using GCS object store");
            let store = GcsObjectStore::new(
                &config.storage_endpoint,
                bucket,
                config.access_token.clone(),
            )
            .map_err(|error| ConfigError::InvalidValue {
                key: "STORAGE_ENDPOINT".to_string(),
                reason: error.to_string(),
            })?;
            Ok(Arc::new(store))
        }
    }
}
