//! Per-document extraction, chunking, and metadata attachment.

use std::sync::Arc;

use crate::{
    extract::{ExtractionError, PageText, TextExtractor},
    metadata::extract_metadata,
    metrics::IngestMetrics,
    processing::{
        chunking::{ChunkingParams, chunk_spans},
        pages::assemble_pages,
        timestamps::{current_timestamp_rfc3339, file_stamp},
        types::{ChunkMetadata, ChunkRecord, DocumentFailure, PrefixOutcome, ProcessingError},
    },
    storage::{JSON_CONTENT_TYPE, ObjectStore},
};

/// Turns stored PDFs into ordered chunk records.
///
/// Documents are processed one at a time; a failing document is logged and skipped without
/// affecting the others.
pub struct DocumentPipeline {
    store: Arc<dyn ObjectStore>,
    extractor: Arc<dyn TextExtractor>,
    chunking: ChunkingParams,
    municipality: String,
    metrics: Arc<IngestMetrics>,
}

impl DocumentPipeline {
    /// Assemble a pipeline from its collaborators.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        extractor: Arc<dyn TextExtractor>,
        chunking: ChunkingParams,
        municipality: impl Into<String>,
        metrics: Arc<IngestMetrics>,
    ) -> Self {
        Self {
            store,
            extractor,
            chunking,
            municipality: municipality.into(),
            metrics,
        }
    }

    /// Chunk already-extracted pages of the document at `path`.
    ///
    /// Blank pages are skipped. Every record carries the same `processed_at` and a
    /// `chunk_index` in `0..total_chunks`.
    pub fn chunk_document(
        &self,
        path: &str,
        pages: &[PageText],
        processed_at: &str,
    ) -> Vec<ChunkRecord> {
        let assembled = assemble_pages(pages);
        let chars: Vec<char> = assembled.text.chars().collect();
        let spans = chunk_spans(&chars, self.chunking);
        let document = extract_metadata(path, &self.municipality);
        let total_chunks = spans.len();

        spans
            .into_iter()
            .enumerate()
            .map(|(chunk_index, span)| {
                let pages = assembled.page_range(&span);
                ChunkRecord {
                    text: chars[span].iter().collect(),
                    metadata: ChunkMetadata {
                        document: document.clone(),
                        chunk_index,
                        total_chunks,
                        processed_at: processed_at.to_string(),
                        page_start: pages.map(|(first, _)| first),
                        page_end: pages.map(|(_, last)| last),
                    },
                }
            })
            .collect()
    }

    /// Read, extract, and chunk a single stored document.
    pub async fn process_document(&self, path: &str) -> Result<Vec<ChunkRecord>, ProcessingError> {
        let bytes = self.store.read(path).await?;
        let pages = self.extract(path, bytes).await?;
        let records = self.chunk_document(path, &pages, &current_timestamp_rfc3339());
        Ok(records)
    }

    /// Process every PDF under `prefix` in listing order.
    ///
    /// Listing failures propagate; per-document failures are logged and reported in the
    /// outcome.
    pub async fn process_prefix(&self, prefix: &str) -> Result<PrefixOutcome, ProcessingError> {
        let paths: Vec<String> = self
            .store
            .list(prefix)
            .await?
            .into_iter()
            .filter(|path| is_pdf(path))
            .collect();
        tracing::info!(prefix, documents = paths.len(), "Processing documents");

        let mut outcome = PrefixOutcome::default();
        for path in paths {
            tracing::info!(document = %path, "Processing document");
            match self.process_document(&path).await {
                Ok(records) => {
                    self.metrics.record_document(records.len() as u64);
                    tracing::info!(document = %path, chunks = records.len(), "Document processed");
                    outcome.records.extend(records);
                    outcome.processed.push(path);
                }
                Err(error) => {
                    self.metrics.record_failure();
                    tracing::error!(document = %path, error = %error, "Skipping document");
                    outcome.failures.push(DocumentFailure {
                        path,
                        error: error.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            prefix,
            processed = outcome.processed.len(),
            failed = outcome.failures.len(),
            chunks = outcome.records.len(),
            "Finished processing prefix"
        );
        Ok(outcome)
    }

    /// Persist chunk records as a timestamped JSON array under `output_prefix`.
    pub async fn save_chunks(
        &self,
        records: &[ChunkRecord],
        output_prefix: &str,
    ) -> Result<String, ProcessingError> {
        let path = format!("{output_prefix}chunks_{}.json", file_stamp());
        let body = serde_json::to_vec_pretty(records)?;
        self.store.write(&path, body, JSON_CONTENT_TYPE).await?;
        tracing::info!(path = %path, chunks = records.len(), "Saved chunk file");
        Ok(path)
    }

    async fn extract(&self, path: &str, bytes: Vec<u8>) -> Result<Vec<PageText>, ProcessingError> {
        let extractor = Arc::clone(&self.extractor);
        tokio::task::spawn_blocking(move || extractor.extract(&bytes))
            .await
            .map_err(|error| ExtractionError::Worker(error.to_string()))
            .and_then(|result| result)
            .map_err(|source| ProcessingError::Extraction {
                path: path.to_string(),
                source,
            })
    }
}

fn is_pdf(path: &str) -> bool {
    path.to_lowercase().ends_with(".pdf")
}
