//! Ingestion service coordinating document processing, embedding, and artifact storage.

use serde::Serialize;
use std::sync::Arc;

use crate::{
    config::Config,
    embedding::{BatchEmbedder, EmbeddingClient},
    extract::TextExtractor,
    metrics::{IngestMetrics, MetricsSnapshot},
    processing::{
        bundle::BundleBuilder,
        chunking::ChunkingParams,
        pipeline::DocumentPipeline,
        types::{DocumentFailure, ProcessingError},
    },
    storage::ObjectStore,
};

/// Result of turning a prefix of PDFs into a chunk file.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessSummary {
    /// Documents chunked successfully.
    pub documents_processed: usize,
    /// Documents skipped after a failure.
    pub documents_failed: usize,
    /// Chunk records written.
    pub chunk_count: usize,
    /// Path of the chunk file.
    pub chunks_file: String,
    /// Skipped documents and their errors.
    pub failures: Vec<DocumentFailure>,
}

/// Result of a full `process → embed` run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Documents chunked successfully.
    pub documents_processed: usize,
    /// Documents skipped after a failure.
    pub documents_failed: usize,
    /// Chunk records written and embedded.
    pub chunk_count: usize,
    /// Path of the chunk file.
    pub chunks_file: String,
    /// Path of the processed bundle.
    pub embeddings_file: String,
    /// Skipped documents and their errors.
    pub failures: Vec<DocumentFailure>,
    /// Counters accumulated during the run.
    pub metrics: MetricsSnapshot,
}

/// Object counts under the configured prefixes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    /// Source PDFs awaiting or past processing.
    pub total_pdfs: usize,
    /// Chunk files written by earlier runs.
    pub chunk_files: usize,
    /// Processed bundles written by earlier runs.
    pub embedding_files: usize,
}

/// Owns the pipeline, the bundle builder, and the shared metrics registry.
///
/// Construct once per process from a [`Config`] and the injected adapters.
pub struct IngestionService {
    store: Arc<dyn ObjectStore>,
    pipeline: DocumentPipeline,
    bundles: BundleBuilder,
    metrics: Arc<IngestMetrics>,
    source_prefix: String,
    chunks_prefix: String,
    embeddings_prefix: String,
}

impl IngestionService {
    /// Wire the service from configuration and adapters.
    pub fn new(
        config: &Config,
        store: Arc<dyn ObjectStore>,
        extractor: Arc<dyn TextExtractor>,
        client: Arc<dyn EmbeddingClient>,
    ) -> Result<Self, ProcessingError> {
        let metrics = Arc::new(IngestMetrics::new());
        let chunking = ChunkingParams::new(config.chunk_size, config.overlap)?;
        let pipeline = DocumentPipeline::new(
            Arc::clone(&store),
            extractor,
            chunking,
            config.municipality.clone(),
            Arc::clone(&metrics),
        );
        let embedder = BatchEmbedder::new(
            client,
            config.batch_size,
            config.rate_limit_delay,
            config.request_timeout,
        )?
        .with_metrics(Arc::clone(&metrics));
        tracing::debug!(
            model = embedder.model_name(),
            chunk_size = chunking.chunk_size(),
            overlap = chunking.overlap(),
            batch_size = config.batch_size,
            "Ingestion service initialized"
        );

        Ok(Self {
            bundles: BundleBuilder::new(Arc::clone(&store), embedder),
            store,
            pipeline,
            metrics,
            source_prefix: config.source_prefix.clone(),
            chunks_prefix: config.chunks_prefix.clone(),
            embeddings_prefix: config.embeddings_prefix.clone(),
        })
    }

    /// Prefix scanned when no explicit prefix is supplied.
    pub fn source_prefix(&self) -> &str {
        &self.source_prefix
    }

    /// Chunk every PDF under `prefix` and persist the chunk file.
    pub async fn process(&self, prefix: &str) -> Result<ProcessSummary, ProcessingError> {
        let outcome = self.pipeline.process_prefix(prefix).await?;
        let chunks_file = self
            .pipeline
            .save_chunks(&outcome.records, &self.chunks_prefix)
            .await?;
        Ok(ProcessSummary {
            documents_processed: outcome.processed.len(),
            documents_failed: outcome.failures.len(),
            chunk_count: outcome.records.len(),
            chunks_file,
            failures: outcome.failures,
        })
    }

    /// Embed an existing chunk file and persist the processed bundle.
    pub async fn embed(&self, chunks_file: &str) -> Result<String, ProcessingError> {
        self.bundles
            .process_chunks_file(chunks_file, &self.embeddings_prefix)
            .await
    }

    /// Process, save, embed, and save again.
    ///
    /// A prefix without usable documents still produces an empty chunk file and bundle.
    pub async fn run(&self, prefix: &str) -> Result<RunSummary, ProcessingError> {
        tracing::info!(prefix, "Starting ingestion run");
        let processed = self.process(prefix).await?;
        let embeddings_file = self.embed(&processed.chunks_file).await?;
        let metrics = self.metrics.snapshot();
        tracing::info!(
            documents_processed = processed.documents_processed,
            documents_failed = processed.documents_failed,
            chunks = processed.chunk_count,
            chunks_file = %processed.chunks_file,
            embeddings_file = %embeddings_file,
            metrics = ?metrics,
            "Ingestion run complete"
        );

        Ok(RunSummary {
            documents_processed: processed.documents_processed,
            documents_failed: processed.documents_failed,
            chunk_count: processed.chunk_count,
            chunks_file: processed.chunks_file,
            embeddings_file,
            failures: processed.failures,
            metrics,
        })
    }

    /// Count source PDFs, chunk files, and bundles.
    pub async fn stats(&self) -> Result<StorageStats, ProcessingError> {
        let total_pdfs = self
            .store
            .list(&self.source_prefix)
            .await?
            .iter()
            .filter(|path| path.to_lowercase().ends_with(".pdf"))
            .count();
        let chunk_files = count_json(self.store.list(&self.chunks_prefix).await?);
        let embedding_files = count_json(self.store.list(&self.embeddings_prefix).await?);
        Ok(StorageStats {
            total_pdfs,
            chunk_files,
            embedding_files,
        })
    }

    /// Current metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

fn count_json(paths: Vec<String>) -> usize {
    paths.iter().filter(|path| path.ends_with(".json")).count()
}
