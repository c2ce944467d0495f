//! Overlapping, boundary-aware character windows.
//!
//! The chunker is a greedy forward scan:
//!
//! - Each window starts where the previous one ended minus `overlap` characters.
//! - A window that would stop before the end of the text is pulled back to just after the last
//!   sentence or paragraph terminator (`.`, `!`, `?`, `\n`) it contains.
//! - When no terminator is available the window is cut at exactly `chunk_size` characters.
//!
//! Offsets are counted in `char`s so multi-byte text never splits inside a code point. A window
//! is never snapped shorter than `overlap + 1` characters, which guarantees every step moves the
//! start forward. Dropping the first `overlap` characters of every chunk after the first and
//! concatenating the rest reproduces the input exactly.

use std::ops::Range;

use super::types::ChunkingError;

const BOUNDARY_CHARS: [char; 4] = ['.', '!', '?', '\n'];

/// Validated window parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingParams {
    chunk_size: usize,
    overlap: usize,
}

impl ChunkingParams {
    /// Validate a chunk size and overlap, both measured in characters.
    ///
    /// Fails when `chunk_size` is zero or `overlap >= chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, ChunkingError> {
        if chunk_size == 0 {
            return Err(ChunkingError::ZeroChunkSize);
        }
        if overlap >= chunk_size {
            return Err(ChunkingError::OverlapTooLarge {
                overlap,
                chunk_size,
            });
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    /// Maximum window length in characters.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Characters shared by consecutive windows.
    pub fn overlap(&self) -> usize {
        self.overlap
    }
}

/// Split `text` into overlapping chunks.
///
/// Returns an empty vector for empty input and a single chunk equal to `text` when it fits in
/// one window.
pub fn chunk_text(text: &str, params: ChunkingParams) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chunk_spans(&chars, params)
        .into_iter()
        .map(|span| chars[span].iter().collect())
        .collect()
}

/// Compute chunk windows as character ranges over `chars`.
pub fn chunk_spans(chars: &[char], params: ChunkingParams) -> Vec<Range<usize>> {
    let total = chars.len();
    let mut spans = Vec::new();
    let mut start = 0;

    while start < total {
        let candidate = (start + params.chunk_size).min(total);
        let end = if candidate < total {
            snap_to_boundary(chars, start, candidate, params.overlap)
        } else {
            total
        };

        spans.push(start..end);
        if end >= total {
            break;
        }
        start = end - params.overlap;
    }

    spans
}

/// Walk back from `candidate` to the character after the nearest terminator.
///
/// Terminators that would leave the window no longer than `overlap` are ignored; falling
/// through returns `candidate` unchanged.
fn snap_to_boundary(chars: &[char], start: usize, candidate: usize, overlap: usize) -> usize {
    let floor = start + overlap;
    (floor..candidate)
        .rev()
        .find(|&index| BOUNDARY_CHARS.contains(&chars[index]))
        .map(|index| index + 1)
        .unwrap_or(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(chunk_size: usize, overlap: usize) -> ChunkingParams {
        ChunkingParams::new(chunk_size, overlap).expect("valid params")
    }

    fn reassemble(chunks: &[String], overlap: usize) -> String {
        let mut rebuilt = String::new();
        for (index, chunk) in chunks.iter().enumerate() {
            if index == 0 {
                rebuilt.push_str(chunk);
            } else {
                rebuilt.extend(chunk.chars().skip(overlap));
            }
        }
        rebuilt
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunk_text("", params(20, 5)).is_empty());
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let text = "Council adjourned.";
        assert_eq!(chunk_text(text, params(40, 5)), vec![text.to_string()]);
        let exact = "a".repeat(40);
        assert_eq!(chunk_text(&exact, params(40, 5)), vec![exact.clone()]);
    }

    #[test]
    fn rejects_overlap_at_or_above_chunk_size() {
        assert!(matches!(
            ChunkingParams::new(10, 10),
            Err(ChunkingError::OverlapTooLarge {
                overlap: 10,
                chunk_size: 10
            })
        ));
        assert!(matches!(
            ChunkingParams::new(10, 25),
            Err(ChunkingError::OverlapTooLarge { .. })
        ));
        assert!(matches!(
            ChunkingParams::new(0, 0),
            Err(ChunkingError::ZeroChunkSize)
        ));
    }

    #[test]
    fn snaps_to_sentence_boundaries() {
        let text = "Sentence one. Sentence two. Sentence three.";
        let chunks = chunk_text(text, params(20, 5));

        assert_eq!(chunks[0], "Sentence one.");
        assert_eq!(chunks[1], " one. Sentence two.");
        assert_eq!(reassemble(&chunks, 5), text);
    }

    #[test]
    fn boundary_inside_window_prevents_mid_word_cut() {
        let text = "Motion carried. Councillor Morrison abstained from the vote";
        let chunks = chunk_text(text, params(30, 4));

        assert_eq!(chunks[0], "Motion carried.");
        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 30));
        assert_eq!(reassemble(&chunks, 4), text);
    }

    #[test]
    fn hard_cut_when_no_boundary_exists() {
        let text = "x".repeat(50);
        let chunks = chunk_text(&text, params(20, 5));

        assert_eq!(chunks[0].len(), 20);
        assert_eq!(chunks[1].len(), 20);
        assert_eq!(reassemble(&chunks, 5), text);
    }

    #[test]
    fn newline_counts_as_boundary() {
        let text = "Page 1:\nThe quick brown fox jumps over the lazy dog";
        let chunks = chunk_text(text, params(24, 3));
        assert_eq!(chunks[0], "Page 1:\n");
        assert!(chunks[1].starts_with("1:\nThe"));
    }

    #[test]
    fn boundary_within_overlap_is_ignored() {
        // The only terminator sits inside the first `overlap` characters, so snapping to it
        // would stall the scan; the window is hard cut instead.
        let text = format!("A.{}", "b".repeat(40));
        let chunks = chunk_text(&text, params(10, 4));
        assert_eq!(chunks[0].chars().count(), 10);
        assert_eq!(reassemble(&chunks, 4), text);
    }

    #[test]
    fn chunks_are_longer_than_overlap() {
        let text = "a. b. c. d. e. f. g. h. i. j. k. l. m. n. o. p.";
        let chunks = chunk_text(text, params(8, 3));
        for chunk in &chunks {
            assert!(chunk.chars().count() > 3, "chunk too short: {chunk:?}");
        }
        assert_eq!(reassemble(&chunks, 3), text);
    }

    #[test]
    fn reconstruction_holds_across_parameters() {
        let text = "The Committee reviewed the staff report!\nIs the variance justified? \
                    The applicant said yes. Residents disagreed at length, citing parking, \
                    setbacks and tree protection.\n\nThe item was deferred.";
        for (chunk_size, overlap) in [(10, 1), (25, 7), (60, 20), (200, 50)] {
            let chunks = chunk_text(text, params(chunk_size, overlap));
            assert_eq!(reassemble(&chunks, overlap), text, "size {chunk_size}/{overlap}");
            assert!(
                chunks
                    .iter()
                    .all(|chunk| chunk.chars().count() <= chunk_size)
            );
        }
    }

    #[test]
    fn multibyte_text_is_split_on_char_offsets() {
        let text = "Comité de révision. Résumé détaillé des décisions prises à la séance.";
        let chunks = chunk_text(text, params(25, 5));
        assert!(chunks.len() > 1);
        assert_eq!(reassemble(&chunks, 5), text);
    }

    #[test]
    fn spans_are_deterministic() {
        let chars: Vec<char> = "One. Two! Three? Four\nFive.".chars().collect();
        let first = chunk_spans(&chars, params(9, 2));
        let second = chunk_spans(&chars, params(9, 2));
        assert_eq!(first, second);
        assert_eq!(first[0].start, 0);
        for pair in first.windows(2) {
            assert_eq!(pair[1].start, pair[0].end - 2);
        }
    }
}
