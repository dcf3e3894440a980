#[cfg(test)]
mod tests;

use std::path::PathBuf;
use std::sync::LazyLock;

use fancy_regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ConfigError;
use crate::document::Document;

pub const DEFAULT_CHUNK_SIZE: usize = 800;
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// Terminal punctuation, optional closing quotes or brackets, then whitespace
static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[.!?]["')\]]*\s"#).expect("valid regex"));

/// A piece of a document ready for embedding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// The chunk text, an exact substring of the page text
    pub text: String,
    /// The PDF this chunk came from
    pub source: PathBuf,
    /// 1-based page number
    pub page: u32,
    /// Position of this chunk across the whole ingest
    pub chunk_index: usize,
    /// Byte offset of `text` within the page text
    pub start_offset: usize,
}

/// Window sizes for chunking, measured in characters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk
    pub chunk_size: usize,
    /// Maximum characters shared by consecutive chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize(self.chunk_size));
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::ChunkOverlapTooLarge(
                self.chunk_overlap,
                self.chunk_size,
            ));
        }

        Ok(())
    }
}

/// Byte range of a chunk within its source text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSpan {
    pub start: usize,
    pub end: usize,
}

impl TextSpan {
    #[inline]
    #[expect(clippy::string_slice, reason = "spans always fall on char boundaries")]
    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }
}

/// Split points, most preferred first
#[derive(Debug, Clone, Copy)]
enum Boundary {
    Paragraph,
    Line,
    Sentence,
    Word,
}

const BOUNDARIES: [Boundary; 4] = [
    Boundary::Paragraph,
    Boundary::Line,
    Boundary::Sentence,
    Boundary::Word,
];

/// Chunk every page of a document. Chunk indices run across all pages.
#[inline]
pub fn chunk_documents(documents: &[Document], config: &ChunkingConfig) -> Vec<Chunk> {
    let mut chunks = Vec::new();

    for document in documents {
        for span in split_text(&document.text, config) {
            chunks.push(Chunk {
                text: span.slice(&document.text).to_string(),
                source: document.source.clone(),
                page: document.page,
                chunk_index: chunks.len(),
                start_offset: span.start,
            });
        }
    }

    debug!(
        "Chunked {} pages into {} chunks (avg {} chars)",
        documents.len(),
        chunks.len(),
        chunks.iter().map(|c| c.text.chars().count()).sum::<usize>() / chunks.len().max(1)
    );

    chunks
}

/// Split text into windows of at most `chunk_size` characters.
///
/// Each window is cut at the last paragraph break in its second half, or
/// failing that the last line break, sentence end, or whitespace, and only
/// then at a hard character limit. The next window starts up to
/// `chunk_overlap` characters before the cut, moved forward to the first word
/// start in that region. Every window ends past the end of the one before it,
/// even when `chunk_overlap` exceeds half of `chunk_size`. Windows are
/// contiguous or overlapping, so the text can be rebuilt by dropping each
/// window's overlap with its predecessor.
#[inline]
pub fn split_text(text: &str, config: &ChunkingConfig) -> Vec<TextSpan> {
    // Byte offset of every char, plus the end of the text
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = offsets.len() - 1;

    if char_count == 0 {
        return Vec::new();
    }

    let size = config.chunk_size.max(1);
    let overlap = config.chunk_overlap.min(size - 1);

    let mut spans = Vec::new();
    let mut start = 0;
    let mut previous_end = 0;

    loop {
        let limit = (start + size).min(char_count);
        let end = if limit == char_count {
            char_count
        } else {
            // A cut at or before the previous end would repeat that window
            let min_cut = (start + (size / 2).max(1))
                .max(previous_end + 1)
                .min(limit);
            find_cut(text, &offsets, start, min_cut, limit)
        };
        previous_end = end;

        spans.push(TextSpan {
            start: offsets[start],
            end: offsets[end],
        });

        if end == char_count {
            break;
        }

        start = next_start(text, &offsets, start, end, overlap);
    }

    spans
}

/// Char index at which the window starting at `start` ends, no earlier than
/// `min_cut`
#[expect(clippy::string_slice, reason = "offsets come from char_indices")]
fn find_cut(text: &str, offsets: &[usize], start: usize, min_cut: usize, limit: usize) -> usize {
    let window = &text[offsets[start]..offsets[limit]];
    let min_len = offsets[min_cut] - offsets[start];

    for boundary in BOUNDARIES {
        let Some(len) = last_boundary(window, boundary) else {
            continue;
        };
        if len < min_len {
            continue;
        }
        if let Ok(index) = offsets.binary_search(&(offsets[start] + len)) {
            return index;
        }
    }

    limit
}

/// Byte length of the longest prefix of `window` that ends right after a
/// boundary of the given kind
fn last_boundary(window: &str, boundary: Boundary) -> Option<usize> {
    match boundary {
        Boundary::Paragraph => window.rfind("\n\n").map(|i| i + 2),
        Boundary::Line => window.rfind('\n').map(|i| i + 1),
        Boundary::Sentence => SENTENCE_END
            .find_iter(window)
            .filter_map(Result::ok)
            .last()
            .map(|m| m.end()),
        Boundary::Word => window
            .char_indices()
            .rev()
            .find(|(_, c)| c.is_whitespace())
            .map(|(i, c)| i + c.len_utf8()),
    }
}

/// Char index where the window after `end` starts. Always past `start`.
fn next_start(text: &str, offsets: &[usize], start: usize, end: usize, overlap: usize) -> usize {
    if overlap == 0 {
        return end;
    }

    let earliest = end.saturating_sub(overlap).max(start + 1);
    (earliest..end)
        .find(|&i| is_word_start(text, offsets[i]))
        .unwrap_or(earliest)
}

#[expect(clippy::string_slice, reason = "offsets come from char_indices")]
fn is_word_start(text: &str, offset: usize) -> bool {
    let previous = text[..offset].chars().next_back();
    let current = text[offset..].chars().next();
    matches!(
        (previous, current),
        (Some(p), Some(c)) if p.is_whitespace() && !c.is_whitespace()
    )
}
