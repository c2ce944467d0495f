//! Embedding client abstraction and adapters.

mod batch;
mod vertex;

pub use batch::{BatchEmbedder, EmbeddingBatchError};
pub use vertex::VertexEmbeddingClient;

use crate::config::{Config, ConfigError, EmbeddingProvider};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider could not be reached.
    #[error("Embedding provider unavailable: {0}")]
    Unavailable(String),
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
    /// Provider response could not be decoded.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce one embedding vector per input text, in input order.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;

    /// Model identifier recorded in bundle provenance.
    fn model_name(&self) -> &str;
}

/// Deterministic embedding client that hashes bytes into a fixed-size, normalized vector.
///
/// Needs no network access; vectors carry no semantic meaning.
pub struct HashEmbeddingClient {
    dimension: usize,
    model: String,
}

impl HashEmbeddingClient {
    /// Construct a client producing vectors of `dimension` floats.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            model: format!("hash-{dimension}"),
        }
    }

    fn encode(text: &str, dimension: usize) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; dimension];

        if text.is_empty() {
            return embedding;
        }

        for (idx, byte) in text.bytes().enumerate() {
            let position = idx % dimension;
            embedding[position] += f32::from(byte) / 255.0;
        }

        let norm = embedding
            .iter()
            .map(|value| value * value)
            .sum::<f32>()
            .sqrt();

        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }

        embedding
    }
}

#[async_trait]
impl EmbeddingClient for HashEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if self.dimension == 0 {
            return Err(EmbeddingClientError::GenerationFailed(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }

        Ok(texts
            .iter()
            .map(|text| Self::encode(text, self.dimension))
            .collect())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Build the embedding client selected by configuration.
pub fn get_embedding_client(
    config: &Config,
) -> Result<Arc<dyn EmbeddingClient>, ConfigError> {
    match config.embedding_provider {
        EmbeddingProvider::Hash => {
            tracing::debug!(dimension = config.embedding_dimension, "Using hash embeddings");
            Ok(Arc::new(HashEmbeddingClient::new(config.embedding_dimension)))
        }
        EmbeddingProvider::Vertex => {
            let project = config.require_project()?;
            let endpoint = config.embedding_endpoint.clone().unwrap_or_else(|| {
                format!("https://{}-aiplatform.googleapis.com", config.location)
            });
            let client = VertexEmbeddingClient::new(
                &endpoint,
                project,
                &config.location,
                &config.model_name,
                config.access_token.clone(),
            )
            .map_err(|error| ConfigError::InvalidValue {
                key: "EMBEDDING_ENDPOINT".to_string(),
                reason: error.to_string(),
            })?;
            tracing::debug!(
                endpoint = %endpoint,
                model = %config.model_name,
                "Using Vertex AI embeddings"
            );
            Ok(Arc::new(client))
        }
    }
}
