//! Character-window chunking with boundary look-back and exact overlap.

use pdfrag_core::{ChunkConfig, ChunkError, Chunker, TextChunk};
use tracing::debug;

/// Splits text into windows of at most `chunk_size` characters.
///
/// Each window is cut at the best natural boundary found in its last fifth
/// (paragraph break, then line break, then sentence end, then whitespace)
/// and falls back to a hard cut. The next window starts `overlap` characters
/// before the previous one ended.
pub struct RecursiveChunker;

impl RecursiveChunker {
    /// Create a new recursive chunker.
    pub fn new() -> Self {
        Self
    }
}

impl Default for RecursiveChunker {
    fn default() -> Self {
        Self::new()
    }
}

impl Chunker for RecursiveChunker {
    fn name(&self) -> &str {
        "recursive"
    }

    fn split(&self, text: &str, config: &ChunkConfig) -> Result<Vec<TextChunk>, ChunkError> {
        validate(config)?;

        if text.is_empty() {
            return Ok(vec![]);
        }

        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();

        // byte_offsets[i] is the byte position of char i; the last entry is text.len()
        let mut byte_offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        byte_offsets.push(text.len());

        let mut chunks = Vec::new();
        let mut start = 0;
        loop {
            let hard_end = (start + config.chunk_size).min(total);
            let end = if hard_end == total {
                total
            } else {
                find_break_point(&chars, start, hard_end, config.overlap)
            };

            let byte_range = byte_offsets[start]..byte_offsets[end];
            chunks.push(TextChunk {
                ordinal: chunks.len() as u32,
                text: text[byte_range.clone()].to_string(),
                char_range: start..end,
                byte_range,
            });

            if end == total {
                break;
            }
            start = end - config.overlap;
        }

        debug!(
            "Split {} chars into {} chunks (size {}, overlap {})",
            total,
            chunks.len(),
            config.chunk_size,
            config.overlap
        );

        Ok(chunks)
    }
}

fn validate(config: &ChunkConfig) -> Result<(), ChunkError> {
    if config.chunk_size == 0 {
        return Err(ChunkError::InvalidConfig(
            "chunk_size must be greater than 0".to_string(),
        ));
    }
    if config.overlap >= config.chunk_size {
        return Err(ChunkError::InvalidConfig(format!(
            "overlap ({}) must be smaller than chunk_size ({})",
            config.overlap, config.chunk_size
        )));
    }
    Ok(())
}

/// Find a good end position for the window `start..hard_end`.
///
/// Returned ends never exceed `hard_end` and always leave the chunk longer
/// than `overlap`, so the next window starts strictly after `start`.
fn find_break_point(chars: &[char], start: usize, hard_end: usize, overlap: usize) -> usize {
    let total = chars.len();
    let search_start = hard_end - (hard_end - start) / 5;
    let min_end = start + overlap + 1;

    let scan = |is_boundary: &dyn Fn(usize) -> bool, advance: usize| -> Option<usize> {
        (search_start..hard_end)
            .rev()
            .filter(|&i| i + advance <= hard_end && i + advance >= min_end)
            .find(|&i| is_boundary(i))
            .map(|i| i + advance)
    };

    // Paragraph break
    let paragraph = |i: usize| i + 1 < total && chars[i] == '\n' && chars[i + 1] == '\n';
    if let Some(end) = scan(&paragraph, 2) {
        return end;
    }

    // Line break
    if let Some(end) = scan(&|i: usize| chars[i] == '\n', 1) {
        return end;
    }

    // Sentence end followed by whitespace
    let sentence_end = |i: usize| {
        matches!(chars[i], '.' | '!' | '?') && i + 1 < total && chars[i + 1].is_whitespace()
    };
    if let Some(end) = scan(&sentence_end, 1) {
        return end;
    }

    // Any whitespace
    if let Some(end) = scan(&|i: usize| chars[i].is_whitespace(), 1) {
        return end;
    }

    hard_end
}
