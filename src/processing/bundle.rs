//! Pairs chunk files with embeddings and persists processed bundles.

use std::sync::Arc;

use crate::{
    embedding::{BatchEmbedder, EmbeddingBatchError},
    processing::{
        timestamps::{current_timestamp_rfc3339, file_stamp},
        types::{ChunkRecord, ProcessedBundle, ProcessingError, RunMetadata},
    },
    storage::{JSON_CONTENT_TYPE, ObjectStore},
};

/// Builds [`ProcessedBundle`]s from chunk records.
pub struct BundleBuilder {
    store: Arc<dyn ObjectStore>,
    embedder: BatchEmbedder,
}

impl BundleBuilder {
    /// Combine an object store with a batch embedder.
    pub fn new(store: Arc<dyn ObjectStore>, embedder: BatchEmbedder) -> Self {
        Self { store, embedder }
    }

    /// Embed every record and pair the vectors with their chunks.
    ///
    /// A failing batch aborts the bundle; the affected documents and chunk indices are logged
    /// so they can be reprocessed.
    pub async fn embed_records(
        &self,
        records: Vec<ChunkRecord>,
        source_file: &str,
    ) -> Result<ProcessedBundle, ProcessingError> {
        let texts: Vec<String> = records.iter().map(|record| record.text.clone()).collect();
        let embeddings = match self.embedder.embed(&texts).await {
            Ok(embeddings) => embeddings,
            Err(error) => {
                log_affected_records(&records, &error, source_file);
                return Err(error.into());
            }
        };

        ProcessedBundle::new(
            records,
            embeddings,
            RunMetadata {
                model: self.embedder.model_name().to_string(),
                processed_at: current_timestamp_rfc3339(),
                source_file: source_file.to_string(),
            },
        )
    }

    /// Load a chunk file, embed it, and write the bundle under `output_prefix`.
    ///
    /// Returns the path of the written bundle.
    pub async fn process_chunks_file(
        &self,
        chunks_path: &str,
        output_prefix: &str,
    ) -> Result<String, ProcessingError> {
        let bytes = self.store.read(chunks_path).await?;
        let records: Vec<ChunkRecord> = serde_json::from_slice(&bytes)?;
        tracing::info!(
            chunks_file = chunks_path,
            chunks = records.len(),
            "Generating embeddings"
        );

        let bundle = self.embed_records(records, chunks_path).await?;
        let path = format!("{output_prefix}municipal_embeddings_{}.json", file_stamp());
        let body = serde_json::to_vec_pretty(&bundle)?;
        self.store.write(&path, body, JSON_CONTENT_TYPE).await?;

        tracing::info!(
            path = %path,
            vectors = bundle.embeddings().len(),
            model = %bundle.metadata().model,
            "Saved embeddings"
        );
        Ok(path)
    }
}

fn log_affected_records(records: &[ChunkRecord], error: &EmbeddingBatchError, source_file: &str) {
    let Some(range) = error.affected_range() else {
        tracing::error!(source_file, error = %error, "Embedding failed");
        return;
    };
    let Some(affected) = records.get(range.clone()) else {
        tracing::error!(source_file, error = %error, "Embedding failed");
        return;
    };

    let mut documents: Vec<(&str, usize, usize)> = Vec::new();
    for record in affected {
        let source = record.metadata.document.source.as_str();
        let index = record.metadata.chunk_index;
        match documents.last_mut() {
            Some((last, _, end)) if *last == source => *end = index,
            _ => documents.push((source, index, index)),
        }
    }

    for (document, first_chunk, last_chunk) in documents {
        tracing::error!(
            source_file,
            document,
            first_chunk,
            last_chunk,
            texts = ?range,
            error = %error,
            "Embedding batch failed; chunks need reprocessing"
        );
    }
}
