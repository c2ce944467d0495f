use std::env;
use std::time::Duration;
use thiserror::Error;

use crate::processing::chunking::ChunkingParams;

const DEFAULT_LOCATION: &str = "us-central1";
const DEFAULT_MODEL: &str = "textembedding-gecko@001";
const DEFAULT_STORAGE_ROOT: &str = "data";
const DEFAULT_STORAGE_ENDPOINT: &str = "https://storage.googleapis.com";
const DEFAULT_MUNICIPALITY: &str = "esquimalt";
const DEFAULT_SOURCE_PREFIX: &str = "esquimalt_data/pdfs/";
const DEFAULT_CHUNKS_PREFIX: &str = "processed/";
const DEFAULT_EMBEDDINGS_PREFIX: &str = "embeddings/";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed or failed validation.
    #[error("Invalid value for environment variable {key}: {reason}")]
    InvalidValue {
        /// Variable that failed to parse.
        key: String,
        /// Human readable explanation of the failure.
        reason: String,
    },
}

/// Runtime configuration for an ingestion run.
///
/// Built once at startup and handed to component constructors; nothing reads it globally.
#[derive(Debug, Clone)]
pub struct Config {
    /// Cloud project that owns the bucket and the embedding model.
    pub project: Option<String>,
    /// Cloud region hosting the embedding model.
    pub location: String,
    /// Bucket holding source documents and generated artifacts.
    pub bucket: Option<String>,
    /// Optional bearer token attached to storage and embedding requests.
    pub access_token: Option<String>,
    /// Object store implementation used for reads and writes.
    pub storage_backend: StorageBackend,
    /// Root directory used by the local object store.
    pub storage_root: String,
    /// Base URL of the cloud storage JSON API.
    pub storage_endpoint: String,
    /// Embedding backend used to vectorize chunks.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub model_name: String,
    /// Optional override for the embedding service base URL.
    pub embedding_endpoint: Option<String>,
    /// Vector length produced by the offline hash provider.
    pub embedding_dimension: usize,
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    pub overlap: usize,
    /// Number of texts submitted per embedding call.
    pub batch_size: usize,
    /// Pause inserted between successive embedding calls.
    pub rate_limit_delay: Duration,
    /// Upper bound on a single embedding call.
    pub request_timeout: Duration,
    /// Municipality tag attached to every chunk.
    pub municipality: String,
    /// Prefix scanned for source PDFs.
    pub source_prefix: String,
    /// Prefix receiving chunk files.
    pub chunks_prefix: String,
    /// Prefix receiving processed bundles.
    pub embeddings_prefix: String,
}

/// Supported object store backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    /// Directory tree on the local filesystem.
    Local,
    /// Google Cloud Storage bucket.
    Gcs,
}

/// Supported embedding backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmbeddingProvider {
    /// Vertex AI text embedding models.
    Vertex,
    /// Deterministic local hashing, useful without network access.
    Hash,
}

impl Config {
    /// Load `.env` (when present) and then read configuration from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Read configuration from the process environment, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let storage_backend = match get("STORAGE_BACKEND") {
            Some(value) => value.parse().map_err(|()| invalid("STORAGE_BACKEND", &value))?,
            None => StorageBackend::Local,
        };
        let embedding_provider = match get("EMBEDDING_PROVIDER") {
            Some(value) => value
                .parse()
                .map_err(|()| invalid("EMBEDDING_PROVIDER", &value))?,
            None => EmbeddingProvider::Vertex,
        };

        let config = Self {
            project: get("GCP_PROJECT"),
            location: get("GCP_LOCATION").unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
            bucket: get("GCS_BUCKET"),
            access_token: get("GCP_ACCESS_TOKEN"),
            storage_backend,
            storage_root: get("STORAGE_ROOT").unwrap_or_else(|| DEFAULT_STORAGE_ROOT.to_string()),
            storage_endpoint: get("STORAGE_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_STORAGE_ENDPOINT.to_string()),
            embedding_provider,
            model_name: get("EMBEDDING_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            embedding_endpoint: get("EMBEDDING_ENDPOINT"),
            embedding_dimension: parse_or("EMBEDDING_DIMENSION", get("EMBEDDING_DIMENSION"), 768)?,
            chunk_size: parse_or("CHUNK_SIZE", get("CHUNK_SIZE"), 1000)?,
            overlap: parse_or("CHUNK_OVERLAP", get("CHUNK_OVERLAP"), 100)?,
            batch_size: parse_or("EMBEDDING_BATCH_SIZE", get("EMBEDDING_BATCH_SIZE"), 5)?,
            rate_limit_delay: Duration::from_millis(parse_or(
                "EMBEDDING_RATE_LIMIT_MS",
                get("EMBEDDING_RATE_LIMIT_MS"),
                1000,
            )?),
            request_timeout: Duration::from_secs(parse_or(
                "EMBEDDING_TIMEOUT_SECS",
                get("EMBEDDING_TIMEOUT_SECS"),
                30,
            )?),
            municipality: get("MUNICIPALITY")
                .unwrap_or_else(|| DEFAULT_MUNICIPALITY.to_string()),
            source_prefix: get("SOURCE_PREFIX")
                .unwrap_or_else(|| DEFAULT_SOURCE_PREFIX.to_string()),
            chunks_prefix: get("CHUNKS_PREFIX")
                .unwrap_or_else(|| DEFAULT_CHUNKS_PREFIX.to_string()),
            embeddings_prefix: get("EMBEDDINGS_PREFIX")
                .unwrap_or_else(|| DEFAULT_EMBEDDINGS_PREFIX.to_string()),
        };

        config.validate()?;
        tracing::debug!(
            storage_backend = ?config.storage_backend,
            embedding_provider = ?config.embedding_provider,
            model = %config.model_name,
            chunk_size = config.chunk_size,
            overlap = config.overlap,
            batch_size = config.batch_size,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Validated chunking parameters derived from `chunk_size` and `overlap`.
    pub fn chunking_params(&self) -> Result<ChunkingParams, ConfigError> {
        ChunkingParams::new(self.chunk_size, self.overlap).map_err(|error| {
            ConfigError::InvalidValue {
                key: "CHUNK_OVERLAP".to_string(),
                reason: error.to_string(),
            }
        })
    }

    /// Project identifier, required by the cloud-backed adapters.
    pub fn require_project(&self) -> Result<&str, ConfigError> {
        self.project
            .as_deref()
            .ok_or_else(|| ConfigError::MissingVariable("GCP_PROJECT".to_string()))
    }

    /// Bucket name, required by the cloud storage adapter.
    pub fn require_bucket(&self) -> Result<&str, ConfigError> {
        self.bucket
            .as_deref()
            .ok_or_else(|| ConfigError::MissingVariable("GCS_BUCKET".to_string()))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.chunking_params()?;
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "EMBEDDING_BATCH_SIZE".to_string(),
                reason: "batch size must be greater than zero".to_string(),
            });
        }
        if self.embedding_provider == EmbeddingProvider::Hash && self.embedding_dimension == 0 {
            return Err(ConfigError::InvalidValue {
                key: "EMBEDDING_DIMENSION".to_string(),
                reason: "embedding dimension must be greater than zero".to_string(),
            });
        }
        if self.storage_backend == StorageBackend::Gcs {
            self.require_bucket()?;
        }
        if self.embedding_provider == EmbeddingProvider::Vertex {
            self.require_project()?;
        }
        Ok(())
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(raw) => raw.trim().parse().map_err(|_| invalid(key, &raw)),
        None => Ok(default),
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: format!("unrecognized value '{value}'"),
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "gcs" => Ok(Self::Gcs),
            _ => Err(()),
        }
    }
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "vertex" => Ok(Self::Vertex),
            "hash" => Ok(Self::Hash),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_for_offline_setup() {
        let config = Config::from_lookup(lookup(&[("EMBEDDING_PROVIDER", "hash")]))
            .expect("config loads");
        assert_eq!(config.storage_backend, StorageBackend::Local);
        assert_eq!(config.embedding_provider, EmbeddingProvider::Hash);
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.overlap, 100);
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.rate_limit_delay, Duration::from_secs(1));
        assert_eq!(config.model_name, "textembedding-gecko@001");
        assert_eq!(config.source_prefix, "esquimalt_data/pdfs/");
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("capture lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn loaded_configuration_is_reported_to_subscriber() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            Config::from_lookup(lookup(&[("EMBEDDING_PROVIDER", "hash")])).expect("config loads");
        });

        let output = String::from_utf8(captured.0.lock().expect("capture lock").clone())
            .expect("utf8 log output");
        assert!(output.contains("Loaded configuration"), "{output}");
        assert!(output.contains("chunk_size=1000"), "{output}");
    }

    #[test]
    fn overlap_not_below_chunk_size_is_rejected() {
        let error = Config::from_lookup(lookup(&[
            ("EMBEDDING_PROVIDER", "hash"),
            ("CHUNK_SIZE", "100"),
            ("CHUNK_OVERLAP", "100"),
        ]))
        .unwrap_err();
        assert!(matches!(
            error,
            ConfigError::InvalidValue { ref key, .. } if key == "CHUNK_OVERLAP"
        ));
    }

    #[test]
    fn unparseable_numbers_are_reported() {
        let error = Config::from_lookup(lookup(&[
            ("EMBEDDING_PROVIDER", "hash"),
            ("EMBEDDING_BATCH_SIZE", "five"),
        ]))
        .unwrap_err();
        assert!(matches!(
            error,
            ConfigError::InvalidValue { ref key, .. } if key == "EMBEDDING_BATCH_SIZE"
        ));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let error = Config::from_lookup(lookup(&[
            ("EMBEDDING_PROVIDER", "hash"),
            ("EMBEDDING_BATCH_SIZE", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(error, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn cloud_backends_require_identifiers() {
        let error = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(error, ConfigError::MissingVariable(ref key) if key == "GCP_PROJECT"));

        let error = Config::from_lookup(lookup(&[
            ("EMBEDDING_PROVIDER", "hash"),
            ("STORAGE_BACKEND", "gcs"),
        ]))
        .unwrap_err();
        assert!(matches!(error, ConfigError::MissingVariable(ref key) if key == "GCS_BUCKET"));
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let error = Config::from_lookup(lookup(&[("EMBEDDING_PROVIDER", "palm")])).unwrap_err();
        assert!(matches!(
            error,
            ConfigError::InvalidValue { ref key, .. } if key == "EMBEDDING_PROVIDER"
        ));
    }
}
