use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing ingestion activity.
#[derive(Default)]
pub struct IngestMetrics {
    documents_processed: AtomicU64,
    documents_failed: AtomicU64,
    chunks_produced: AtomicU64,
    embedding_batches: AtomicU64,
    vectors_generated: AtomicU64,
}

impl IngestMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successfully chunked document.
    pub fn record_document(&self, chunk_count: u64) {
        self.documents_processed.fetch_add(1, Ordering::Relaxed);
        self.chunks_produced
            .fetch_add(chunk_count, Ordering::Relaxed);
    }

    /// Record a document that was skipped after a failure.
    pub fn record_failure(&self) {
        self.documents_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed embedding call and the vectors it returned.
    pub fn record_batch(&self, vector_count: u64) {
        self.embedding_batches.fetch_add(1, Ordering::Relaxed);
        self.vectors_generated
            .fetch_add(vector_count, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_processed: self.documents_processed.load(Ordering::Relaxed),
            documents_failed: self.documents_failed.load(Ordering::Relaxed),
            chunks_produced: self.chunks_produced.load(Ordering::Relaxed),
            embedding_batches: self.embedding_batches.load(Ordering::Relaxed),
            vectors_generated: self.vectors_generated.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of ingestion counters used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Documents chunked successfully.
    pub documents_processed: u64,
    /// Documents skipped because extraction or reading failed.
    pub documents_failed: u64,
    /// Total chunk records produced.
    pub chunks_produced: u64,
    /// Embedding calls that completed successfully.
    pub embedding_batches: u64,
    /// Vectors returned across all embedding calls.
    pub vectors_generated: u64,
}
