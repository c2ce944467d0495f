//! Document processing pipeline: page assembly, chunking, embedding, and artifact persistence.

mod bundle;
pub mod chunking;
pub mod pages;
mod pipeline;
mod service;
mod timestamps;
pub mod types;

pub use bundle::BundleBuilder;
pub use pipeline::DocumentPipeline;
pub use service::{IngestionService, ProcessSummary, RunSummary, StorageStats};
pub use types::{
    ChunkMetadata, ChunkRecord, ChunkingError, DocumentFailure, PrefixOutcome, ProcessedBundle,
    ProcessingError, RunMetadata,
};
