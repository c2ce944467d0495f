//! Sequential, rate-limited batching over an [`EmbeddingClient`].
//!
//! Texts are split into contiguous batches and sent one call at a time, with a fixed pause
//! between calls. The first failing batch aborts the whole request: vectors are only returned
//! when every text has one, so position `i` of the output always belongs to text `i`.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use super::{EmbeddingClient, EmbeddingClientError};
use crate::metrics::IngestMetrics;

/// Errors surfaced by [`BatchEmbedder::embed`].
///
/// `start..end` is the half-open range of input positions covered by the failing batch.
#[derive(Debug, Error)]
pub enum EmbeddingBatchError {
    /// Batches must hold at least one text.
    #[error("embedding batch size must be greater than zero")]
    InvalidBatchSize,
    /// The provider rejected the batch.
    #[error("embedding batch {batch} (texts {start}..{end}) failed: {source}")]
    Failed {
        /// Zero-based batch number.
        batch: usize,
        /// First input position in the batch.
        start: usize,
        /// One past the last input position in the batch.
        end: usize,
        /// Provider error.
        #[source]
        source: EmbeddingClientError,
    },
    /// The provider did not answer within the per-call timeout.
    #[error("embedding batch {batch} (texts {start}..{end}) timed out after {timeout:?}")]
    TimedOut {
        /// Zero-based batch number.
        batch: usize,
        /// First input position in the batch.
        start: usize,
        /// One past the last input position in the batch.
        end: usize,
        /// Timeout that elapsed.
        timeout: Duration,
    },
    /// The provider returned a different number of vectors than texts.
    #[error(
        "embedding batch {batch} (texts {start}..{end}) returned {actual} vectors, expected {expected}"
    )]
    CountMismatch {
        /// Zero-based batch number.
        batch: usize,
        /// First input position in the batch.
        start: usize,
        /// One past the last input position in the batch.
        end: usize,
        /// Vectors requested.
        expected: usize,
        /// Vectors received.
        actual: usize,
    },
}

impl EmbeddingBatchError {
    /// Input positions covered by the failing batch, when known.
    pub fn affected_range(&self) -> Option<std::ops::Range<usize>> {
        match self {
            Self::InvalidBatchSize => None,
            Self::Failed { start, end, .. }
            | Self::TimedOut { start, end, .. }
            | Self::CountMismatch { start, end, .. } => Some(*start..*end),
        }
    }
}

/// Splits texts into fixed-size batches and embeds them one call at a time.
pub struct BatchEmbedder {
    client: Arc<dyn EmbeddingClient>,
    batch_size: usize,
    rate_limit_delay: Duration,
    request_timeout: Duration,
    metrics: Option<Arc<IngestMetrics>>,
}

impl BatchEmbedder {
    /// Construct a batcher; `batch_size` must be non-zero.
    pub fn new(
        client: Arc<dyn EmbeddingClient>,
        batch_size: usize,
        rate_limit_delay: Duration,
        request_timeout: Duration,
    ) -> Result<Self, EmbeddingBatchError> {
        if batch_size == 0 {
            return Err(EmbeddingBatchError::InvalidBatchSize);
        }
        Ok(Self {
            client,
            batch_size,
            rate_limit_delay,
            request_timeout,
            metrics: None,
        })
    }

    /// Record completed batches into `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<IngestMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Model identifier of the underlying client.
    pub fn model_name(&self) -> &str {
        self.client.model_name()
    }

    /// Embed `texts`, returning exactly one vector per text in input order.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingBatchError> {
        let mut vectors = Vec::with_capacity(texts.len());
        let batch_count = texts.len().div_ceil(self.batch_size);

        for (batch, chunk) in texts.chunks(self.batch_size).enumerate() {
            if batch > 0 && !self.rate_limit_delay.is_zero() {
                tokio::time::sleep(self.rate_limit_delay).await;
            }

            let start = batch * self.batch_size;
            let end = start + chunk.len();
            tracing::debug!(batch, batch_count, start, end, "Requesting embeddings");

            let request = self.client.generate_embeddings(chunk.to_vec());
            let outcome = tokio::time::timeout(self.request_timeout, request).await;

            let batch_vectors = match outcome {
                Err(_) => {
                    tracing::error!(
                        batch,
                        start,
                        end,
                        timeout = ?self.request_timeout,
                        "Embedding batch timed out"
                    );
                    return Err(EmbeddingBatchError::TimedOut {
                        batch,
                        start,
                        end,
                        timeout: self.request_timeout,
                    });
                }
                Ok(Err(source)) => {
                    tracing::error!(batch, start, end, error = %source, "Embedding batch failed");
                    return Err(EmbeddingBatchError::Failed {
                        batch,
                        start,
                        end,
                        source,
                    });
                }
                Ok(Ok(batch_vectors)) => batch_vectors,
            };

            if batch_vectors.len() != chunk.len() {
                tracing::error!(
                    batch,
                    start,
                    end,
                    expected = chunk.len(),
                    actual = batch_vectors.len(),
                    "Embedding batch returned wrong vector count"
                );
                return Err(EmbeddingBatchError::CountMismatch {
                    batch,
                    start,
                    end,
                    expected: chunk.len(),
                    actual: batch_vectors.len(),
                });
            }

            if let Some(metrics) = &self.metrics {
                metrics.record_batch(batch_vectors.len() as u64);
            }
            vectors.extend(batch_vectors);
        }

        Ok(vectors)
    }
}
