//! Page assembly and page attribution for extracted document text.
//!
//! Pages are joined as `"\nPage N:\n{text}"` in page order. The markers stay in the chunk text
//! so consumers can attribute passages to pages; [`split_pages`] reverses the assembly.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use crate::extract::PageText;

static MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\nPage (\d+):\n").expect("page marker pattern is valid"));

/// Character range of one page's text inside [`AssembledText::text`], marker excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSpan {
    /// One-based page number.
    pub number: u32,
    /// Character offsets of the page text.
    pub text: Range<usize>,
}

/// Document text plus the location of every page's text.
#[derive(Debug, Clone, Default)]
pub struct AssembledText {
    /// Concatenated, marker-delimited text.
    pub text: String,
    /// Page text ranges in ascending, non-overlapping order.
    pub pages: Vec<PageSpan>,
}

impl AssembledText {
    /// First and last page whose text overlaps the character range `span`.
    ///
    /// Markers do not count: a span holding only `"\nPage N:\n"` is not credited to page N.
    pub fn page_range(&self, span: &Range<usize>) -> Option<(u32, u32)> {
        let first = self.pages.partition_point(|page| page.text.end <= span.start);
        let end = self.pages.partition_point(|page| page.text.start < span.end);
        if first >= end {
            return None;
        }
        Some((self.pages[first].number, self.pages[end - 1].number))
    }
}

fn page_marker(number: u32) -> String {
    format!("\nPage {number}:\n")
}

/// Join page texts in page order, skipping pages with no visible text.
pub fn assemble_pages(pages: &[PageText]) -> AssembledText {
    let mut assembled = AssembledText::default();
    let mut offset = 0;

    for page in pages.iter().filter(|page| !page.text.trim().is_empty()) {
        let marker = page_marker(page.number);
        let text_start = offset + marker.chars().count();
        offset = text_start + page.text.chars().count();
        assembled.pages.push(PageSpan {
            number: page.number,
            text: text_start..offset,
        });
        assembled.text.push_str(&marker);
        assembled.text.push_str(&page.text);
    }

    assembled
}

/// Recover `(page_number, text)` pairs from text built by [`assemble_pages`].
///
/// Text before the first marker is discarded.
pub fn split_pages(text: &str) -> Vec<PageText> {
    let headers: Vec<(u32, usize, usize)> = MARKER
        .captures_iter(text)
        .filter_map(|captures| {
            let whole = captures.get(0)?;
            let number = captures.get(1)?.as_str().parse().ok()?;
            Some((number, whole.start(), whole.end()))
        })
        .collect();

    headers
        .iter()
        .enumerate()
        .map(|(index, (number, _, body_start))| {
            let body_end = headers
                .get(index + 1)
                .map(|(_, next_start, _)| *next_start)
                .unwrap_or(text.len());
            PageText {
                number: *number,
                text: text[*body_start..body_end].to_string(),
            }
        })
        .collect()
}
