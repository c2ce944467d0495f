//! Vertex AI text-embedding adapter.
//!
//! Issues `:predict` calls against a publisher model directly over HTTP. Authentication is a
//! caller-supplied bearer token (for example from `gcloud auth print-access-token`).

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

use super::{EmbeddingClient, EmbeddingClientError};

/// Embedding client for Vertex AI publisher models such as `textembedding-gecko`.
pub struct VertexEmbeddingClient {
    http: Client,
    endpoint: String,
    model: String,
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    embeddings: PredictionEmbeddings,
}

#[derive(Debug, Deserialize)]
struct PredictionEmbeddings {
    values: Vec<f32>,
}

impl VertexEmbeddingClient {
    /// Construct a client for `model` in `project`/`location`, rooted at `base_url`.
    pub fn new(
        base_url: &str,
        project: &str,
        location: &str,
        model: &str,
        access_token: Option<String>,
    ) -> Result<Self, EmbeddingClientError> {
        let http = Client::builder()
            .user_agent("municipal-ingest/embedding")
            .build()
            .map_err(|error| EmbeddingClientError::Unavailable(error.to_string()))?;
        let endpoint = format!(
            "{}/v1/projects/{project}/locations/{location}/publishers/google/models/{model}:predict",
            base_url.trim_end_matches('/')
        );
        Ok(Self {
            http,
            endpoint,
            model: model.to_string(),
            access_token,
        })
    }
}

#[async_trait]
impl EmbeddingClient for VertexEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        let expected = texts.len();
        let instances: Vec<_> = texts
            .into_iter()
            .map(|content| json!({ "content": content }))
            .collect();

        let mut request = self
            .http
            .post(&self.endpoint)
            .json(&json!({ "instances": instances }));
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|error| {
            EmbeddingClientError::Unavailable(format!(
                "failed to reach Vertex AI at {}: {error}",
                self.endpoint
            ))
        })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(EmbeddingClientError::Unavailable(format!(
                "model endpoint {} returned 404",
                self.endpoint
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingClientError::GenerationFailed(format!(
                "Vertex AI returned {status}: {body}"
            )));
        }

        let body: PredictResponse = response.json().await.map_err(|error| {
            EmbeddingClientError::InvalidResponse(format!(
                "failed to decode Vertex AI response: {error}"
            ))
        })?;

        if body.predictions.len() != expected {
            return Err(EmbeddingClientError::InvalidResponse(format!(
                "expected {expected} predictions, received {}",
                body.predictions.len()
            )));
        }

        Ok(body
            .predictions
            .into_iter()
            .map(|prediction| prediction.embeddings.values)
            .collect())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
