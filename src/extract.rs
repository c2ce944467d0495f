//! PDF text extraction.

use std::panic::{AssertUnwindSafe, catch_unwind};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while pulling text out of a document.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The PDF library rejected the document.
    #[error("failed to extract PDF text: {0}")]
    Pdf(String),
    /// The PDF library panicked on malformed input.
    #[error("PDF extraction panicked: {0}")]
    Panicked(String),
    /// The blocking extraction task could not be joined.
    #[error("extraction worker failed: {0}")]
    Worker(String),
}

/// Text extracted from a single page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageText {
    /// One-based page number.
    pub number: u32,
    /// Linear text for the page; may be empty for image-only pages.
    pub text: String,
}

/// Converts raw document bytes into ordered page texts.
pub trait TextExtractor: Send + Sync {
    /// Extract page texts in page order. Pages without text yield empty strings.
    fn extract(&self, document: &[u8]) -> Result<Vec<PageText>, ExtractionError>;
}

/// Extractor backed by the `pdf-extract` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTextExtractor;

impl PdfTextExtractor {
    /// Construct a new extractor.
    pub const fn new() -> Self {
        Self
    }
}

impl TextExtractor for PdfTextExtractor {
    fn extract(&self, document: &[u8]) -> Result<Vec<PageText>, ExtractionError> {
        let pages = catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem_by_pages(document)
        }))
        .map_err(|payload| ExtractionError::Panicked(panic_message(payload.as_ref())))?
        .map_err(|error| ExtractionError::Pdf(error.to_string()))?;

        Ok(pages
            .into_iter()
            .zip(1u32..)
            .map(|(text, number)| PageText { number, text })
            .collect())
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_are_an_error_not_a_panic() {
        let result = PdfTextExtractor::new().extract(b"this is not a pdf");
        assert!(result.is_err());
    }

    #[test]
    fn panic_payloads_are_rendered() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("bad xref");
        assert_eq!(panic_message(payload.as_ref()), "bad xref");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bad trailer"));
        assert_eq!(panic_message(payload.as_ref()), "bad trailer");
        let payload: Box<dyn std::any::Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
