//! Document chunking for embedding and retrieval.
//!
//! Splits the concatenated text of a document's pages into overlapping
//! chunks using a sliding window, preferring paragraph and sentence
//! boundaries over hard cuts. All sizes and offsets are measured in
//! characters, never bytes, so multi-byte text is split safely.

use serde::{Deserialize, Serialize};

use crate::pdf::Page;

use super::models::{Chunk, ChunkMetadata};

/// Default maximum characters per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default overlap characters between consecutive chunks.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Window configuration for the chunk splitter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Characters of overlap between consecutive chunks.
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// Character span of one page within the concatenated document text.
struct PageSpan {
    number: usize,
    start: usize,
    end: usize,
}

/// Split a document's pages into embedding-ready chunks.
///
/// Pages are joined into one text stream; each resulting chunk records the
/// page range it covers and its character offsets within the stream.
/// Empty input produces an empty output.
pub fn chunk_pages(pages: &[Page], config: &ChunkingConfig) -> Vec<Chunk> {
    let (text, spans) = concat_pages(pages);
    if text.trim().is_empty() {
        return Vec::new();
    }

    sliding_window(&text, config.chunk_size, config.chunk_overlap)
        .into_iter()
        .enumerate()
        .map(|(index, (content, start, end))| {
            let (page_start, page_end) = page_range(&spans, start, end);
            Chunk::new(
                index as u32,
                content,
                ChunkMetadata {
                    page_start,
                    page_end,
                    start_offset: start,
                    end_offset: end,
                },
            )
        })
        .collect()
}

/// Concatenate page texts into one stream and record each page's character
/// span. Page boundaries are soft: the splitter sees one continuous text
/// and chunks keep a page back-reference via the span table.
fn concat_pages(pages: &[Page]) -> (String, Vec<PageSpan>) {
    let mut text = String::new();
    let mut spans = Vec::with_capacity(pages.len());
    let mut cursor = 0usize;

    for page in pages {
        let len = page.text.chars().count();
        text.push_str(&page.text);
        spans.push(PageSpan {
            number: page.number,
            start: cursor,
            end: cursor + len,
        });
        cursor += len;
    }

    (text, spans)
}

/// Map a chunk's character range to the pages it overlaps.
fn page_range(spans: &[PageSpan], start: usize, end: usize) -> (usize, usize) {
    let first = spans
        .iter()
        .find(|s| s.end > start && s.start < end)
        .map(|s| s.number);
    let last = spans
        .iter()
        .rev()
        .find(|s| s.end > start && s.start < end)
        .map(|s| s.number);

    match (first, last) {
        (Some(a), Some(b)) => (a, b),
        // Only reachable when every span is zero-width.
        _ => (1, 1),
    }
}

/// Split text into overlapping chunks using a sliding window.
/// Returns tuples of (chunk_text, start_offset, end_offset) in characters.
fn sliding_window(text: &str, max_chars: usize, overlap: usize) -> Vec<(String, usize, usize)> {
    if text.is_empty() || max_chars == 0 {
        return Vec::new();
    }

    // Byte offset of every character boundary, with a trailing sentinel.
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(b, _)| b)
        .chain(std::iter::once(text.len()))
        .collect();
    let total = boundaries.len() - 1;

    // If text is small enough, return as single chunk
    if total <= max_chars {
        return vec![(text.to_string(), 0, total)];
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < total {
        let end = (start + max_chars).min(total);

        // Try to find a good break point (sentence or paragraph boundary)
        let chunk_end = if end < total {
            let window = &text[boundaries[start]..boundaries[end]];
            find_break_point(window)
                .map(|byte_pos| start + window[..byte_pos].chars().count())
                .unwrap_or(end)
        } else {
            end
        };

        chunks.push((
            text[boundaries[start]..boundaries[chunk_end]].to_string(),
            start,
            chunk_end,
        ));

        if chunk_end == total {
            break;
        }

        // Move start position, accounting for overlap
        let step = chunk_end - start;
        if step <= overlap {
            // Avoid re-emitting the same window when the chunk is tiny
            start = chunk_end;
        } else {
            start = chunk_end - overlap;
        }
    }

    chunks
}

/// Find a good break point in a window (prefer paragraph/sentence boundaries).
/// Returns a byte offset within the window.
fn find_break_point(window: &str) -> Option<usize> {
    let len = window.len();

    // Look for paragraph boundary (double newline)
    if let Some(pos) = window.rfind("\n\n") {
        if pos > len / 3 {
            return Some(pos + 2);
        }
    }

    // Look for sentence boundary
    for pattern in &[". ", "! ", "? ", ".\n", "!\n", "?\n"] {
        if let Some(pos) = window.rfind(pattern) {
            if pos > len / 3 {
                return Some(pos + pattern.len());
            }
        }
    }

    // Look for any newline
    if let Some(pos) = window.rfind('\n') {
        if pos > len / 3 {
            return Some(pos + 1);
        }
    }

    // Look for comma or semicolon
    for pattern in &[", ", "; "] {
        if let Some(pos) = window.rfind(pattern) {
            if pos > len / 2 {
                return Some(pos + pattern.len());
            }
        }
    }

    // Fall back to word boundary
    if let Some(pos) = window.rfind(' ') {
        return Some(pos + 1);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(number: usize, text: &str) -> Page {
        Page {
            number,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_empty_pages_produce_no_chunks() {
        assert!(chunk_pages(&[], &ChunkingConfig::default()).is_empty());
        assert!(chunk_pages(&[page(1, "")], &ChunkingConfig::default()).is_empty());
        assert!(chunk_pages(&[page(1, "   \n  ")], &ChunkingConfig::default()).is_empty());
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_pages(&[page(1, "Hello world")], &ChunkingConfig::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Hello world");
        assert_eq!(chunks[0].metadata.page_start, 1);
        assert_eq!(chunks[0].metadata.page_end, 1);
    }

    #[test]
    fn test_two_pages_1200_chars_hard_cut() {
        // Two 600-char pages with no break opportunities: the window cuts
        // hard at 1000 and the second chunk starts at character 800.
        let a = "A".repeat(600);
        let b = "B".repeat(600);
        let config = ChunkingConfig {
            chunk_size: 1000,
            chunk_overlap: 200,
        };
        let chunks = chunk_pages(&[page(1, &a), page(2, &b)], &config);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].metadata.start_offset, 0);
        assert_eq!(chunks[0].metadata.end_offset, 1000);
        assert_eq!(chunks[1].metadata.start_offset, 800);
        assert_eq!(chunks[1].metadata.end_offset, 1200);
        assert_eq!(chunks[0].content.chars().count(), 1000);
        assert_eq!(chunks[1].content.chars().count(), 400);
        // Both chunks straddle the page boundary region correctly.
        assert_eq!(chunks[0].metadata.page_start, 1);
        assert_eq!(chunks[0].metadata.page_end, 2);
        assert_eq!(chunks[1].metadata.page_start, 2);
        assert_eq!(chunks[1].metadata.page_end, 2);
    }

    #[test]
    fn test_hard_cut_overlap_is_exact() {
        let text = "x".repeat(2500);
        let windows = sliding_window(&text, 1000, 200);
        for pair in windows.windows(2) {
            let (_, _, prev_end) = pair[0];
            let (_, next_start, _) = pair[1];
            assert_eq!(prev_end - next_start, 200);
        }
    }

    #[test]
    fn test_reconstruction_from_offsets() {
        let text: String = "The quick brown fox jumps over the lazy dog. ".repeat(60);
        let windows = sliding_window(&text, 400, 80);
        assert!(windows.len() > 1);

        // Stitch chunks back together using their recorded offsets; the
        // result must equal the original stream exactly.
        let mut rebuilt = String::new();
        let mut covered = 0usize;
        for (content, start, end) in &windows {
            assert!(*start <= covered, "gap in coverage at {start}");
            let skip = covered - start;
            rebuilt.extend(content.chars().skip(skip));
            covered = *end;
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_prefers_sentence_boundary() {
        let text = format!("{}. {}", "a".repeat(500), "b".repeat(600));
        let windows = sliding_window(&text, 1000, 200);
        // First window ends just after ". " rather than at the hard cut.
        assert_eq!(windows[0].2, 502);
        assert!(windows[0].0.ends_with(". "));
    }

    #[test]
    fn test_multibyte_text_is_not_split_mid_char() {
        let text = "é".repeat(1500);
        let windows = sliding_window(&text, 1000, 200);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].0.chars().count(), 1000);
        assert_eq!(windows[1].0.chars().count(), 700);
    }
}
