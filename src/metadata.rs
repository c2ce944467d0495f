//! Filename-derived document metadata.
//!
//! Everything here is computed from the storage path alone: document type from keyword rules,
//! year from digit patterns, and the bare filename. Content is never inspected.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Classification of a municipal document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    /// Municipal bylaw.
    Bylaw,
    /// Council or staff policy.
    Policy,
    /// Meeting minutes.
    Minutes,
    /// Meeting agenda.
    Agenda,
    /// Permit or permit application.
    Permit,
    /// Staff or consultant report.
    Report,
    /// Anything not matched by a keyword rule.
    Other,
}

/// Keyword rules evaluated in order; the first substring hit wins.
const TYPE_RULES: &[(&str, DocumentType)] = &[
    ("bylaw", DocumentType::Bylaw),
    ("policy", DocumentType::Policy),
    ("minutes", DocumentType::Minutes),
    ("agenda", DocumentType::Agenda),
    ("permit", DocumentType::Permit),
    ("report", DocumentType::Report),
];

const MIN_YEAR: i32 = 1800;
const MAX_YEAR: i32 = 2199;

impl DocumentType {
    /// Lowercase label used in serialized metadata.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bylaw => "bylaw",
            Self::Policy => "policy",
            Self::Minutes => "minutes",
            Self::Agenda => "agenda",
            Self::Permit => "permit",
            Self::Report => "report",
            Self::Other => "other",
        }
    }

    /// Classify a filename by case-insensitive keyword match.
    pub fn from_filename(filename: &str) -> Self {
        let lowered = filename.to_lowercase();
        TYPE_RULES
            .iter()
            .find(|(keyword, _)| lowered.contains(keyword))
            .map(|(_, kind)| *kind)
            .unwrap_or(Self::Other)
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document-level metadata shared by every chunk of a document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Storage path the document was read from.
    pub source: String,
    /// Municipality the document belongs to.
    pub municipality: String,
    /// Classification derived from the filename.
    pub document_type: DocumentType,
    /// Four-digit year found in the filename, if any.
    pub year: Option<i32>,
    /// Final path segment of `source`.
    pub filename: String,
}

/// Derive metadata for the document stored at `path`.
pub fn extract_metadata(path: &str, municipality: &str) -> DocumentMetadata {
    let filename = filename_of(path).to_string();
    DocumentMetadata {
        source: path.to_string(),
        municipality: municipality.to_string(),
        document_type: DocumentType::from_filename(&filename),
        year: extract_year(&filename),
        filename,
    }
}

/// Find a year in a filename.
///
/// `20xx` runs are preferred over any other four-digit run. Runs outside 1800..=2199 are
/// skipped, so a later in-range run can still match.
pub fn extract_year(filename: &str) -> Option<i32> {
    static MODERN: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"20\d{2}").expect("modern year pattern is valid"));
    static GENERIC: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\d{4}").expect("generic year pattern is valid"));

    [&*MODERN, &*GENERIC].into_iter().find_map(|pattern| {
        pattern
            .find_iter(filename)
            .filter_map(|found| found.as_str().parse::<i32>().ok())
            .find(|year| (MIN_YEAR..=MAX_YEAR).contains(year))
    })
}

fn filename_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
