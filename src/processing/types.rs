//! Core data types and error definitions for the processing pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::embedding::EmbeddingBatchError;
use crate::extract::ExtractionError;
use crate::metadata::DocumentMetadata;
use crate::storage::StorageError;

/// Errors produced by an invalid chunking configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkingError {
    /// Windows must hold at least one character.
    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,
    /// Overlap must be strictly smaller than the window or the scan cannot advance.
    #[error("chunk overlap ({overlap}) must be smaller than chunk size ({chunk_size})")]
    OverlapTooLarge {
        /// Requested overlap in characters.
        overlap: usize,
        /// Requested chunk size in characters.
        chunk_size: usize,
    },
}

/// Errors emitted by the document processing pipeline.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// Chunking parameters were rejected.
    #[error("Invalid chunking configuration: {0}")]
    Chunking(#[from] ChunkingError),
    /// Text extraction failed for a document.
    #[error("Failed to extract text from {path}: {source}")]
    Extraction {
        /// Storage path of the failing document.
        path: String,
        /// Underlying extraction failure.
        #[source]
        source: ExtractionError,
    },
    /// Object store read, write, or listing failed.
    #[error("Storage request failed: {0}")]
    Storage(#[from] StorageError),
    /// An embedding batch failed and the run cannot produce a complete bundle.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingBatchError),
    /// A persisted artifact could not be encoded or decoded.
    #[error("Failed to (de)serialize artifact: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Chunks and embeddings fell out of positional correspondence.
    #[error("Bundle has {chunks} chunks but {embeddings} embeddings")]
    BundleMismatch {
        /// Number of chunk records.
        chunks: usize,
        /// Number of embedding vectors.
        embeddings: usize,
    },
}

/// Metadata attached to a single chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Filename-derived document metadata.
    #[serde(flatten)]
    pub document: DocumentMetadata,
    /// Zero-based position of the chunk within its document.
    pub chunk_index: usize,
    /// Number of chunks produced for the document.
    pub total_chunks: usize,
    /// RFC3339 timestamp of the processing pass that produced the chunk.
    pub processed_at: String,
    /// First page contributing text to the chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_start: Option<u32>,
    /// Last page contributing text to the chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_end: Option<u32>,
}

/// A chunk of document text with its provenance.
///
/// `(metadata.document.source, metadata.chunk_index)` identifies a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Chunk text, including any page markers it spans.
    pub text: String,
    /// Provenance metadata.
    pub metadata: ChunkMetadata,
}

/// Provenance of an embedding run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Embedding model that produced the vectors.
    pub model: String,
    /// RFC3339 timestamp of the run.
    pub processed_at: String,
    /// Chunk file the bundle was built from.
    pub source_file: String,
}

/// Chunk records paired index-for-index with their embedding vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedBundle {
    chunks: Vec<ChunkRecord>,
    embeddings: Vec<Vec<f32>>,
    metadata: RunMetadata,
}

impl ProcessedBundle {
    /// Pair chunks with embeddings, rejecting mismatched lengths.
    pub fn new(
        chunks: Vec<ChunkRecord>,
        embeddings: Vec<Vec<f32>>,
        metadata: RunMetadata,
    ) -> Result<Self, ProcessingError> {
        if chunks.len() != embeddings.len() {
            return Err(ProcessingError::BundleMismatch {
                chunks: chunks.len(),
                embeddings: embeddings.len(),
            });
        }
        Ok(Self {
            chunks,
            embeddings,
            metadata,
        })
    }

    /// Decode a bundle from JSON, re-checking the length invariant.
    pub fn from_json(bytes: &[u8]) -> Result<Self, ProcessingError> {
        let bundle: Self = serde_json::from_slice(bytes)?;
        Self::new(bundle.chunks, bundle.embeddings, bundle.metadata)
    }

    /// Chunk records in emission order.
    pub fn chunks(&self) -> &[ChunkRecord] {
        &self.chunks
    }

    /// Embedding vectors; position `i` belongs to chunk `i`.
    pub fn embeddings(&self) -> &[Vec<f32>] {
        &self.embeddings
    }

    /// Run provenance.
    pub fn metadata(&self) -> &RunMetadata {
        &self.metadata
    }
}

/// A document that was skipped during prefix processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentFailure {
    /// Storage path of the skipped document.
    pub path: String,
    /// Rendered error that caused the skip.
    pub error: String,
}

/// Result of processing every document under a prefix.
#[derive(Debug, Clone, Default)]
pub struct PrefixOutcome {
    /// Chunk records of all successful documents, in document order.
    pub records: Vec<ChunkRecord>,
    /// Paths processed successfully.
    pub processed: Vec<String>,
    /// Documents skipped after a failure.
    pub failures: Vec<DocumentFailure>,
}
