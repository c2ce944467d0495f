#![deny(missing_docs)]

//! Core library for the municipal document ingestion pipeline.

/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// PDF text extraction.
pub mod extract;
/// Structured logging and tracing setup.
pub mod logging;
/// Filename-derived document metadata.
pub mod metadata;
/// Ingestion metrics helpers.
pub mod metrics;
/// Document processing pipeline utilities.
pub mod processing;
/// Object store abstraction and adapters.
pub mod storage;
