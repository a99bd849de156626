//! Boundary-respecting text chunking with overlap

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::ChunkingConfig;
use crate::error::Result;
use crate::types::{Chunk, ChunkSource, Section};

static BLANK_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t]*\n").expect("Invalid regex"));

static SENTENCE_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[.!?]["')\]]*\s"#).expect("Invalid regex"));

/// Text chunker with a hard size limit and configurable overlap
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Maximum chunk body size in characters
    max_chunk_chars: usize,
    /// Characters carried over from the end of the previous chunk
    overlap_chars: usize,
}

impl TextChunker {
    /// Create a new chunker. `overlap_chars` must be smaller than `max_chunk_chars`.
    pub fn new(max_chunk_chars: usize, overlap_chars: usize) -> Result<Self> {
        ChunkingConfig {
            max_chunk_chars,
            overlap_chars,
            ..Default::default()
        }
        .validate()?;

        Ok(Self {
            max_chunk_chars,
            overlap_chars,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.max_chunk_chars, config.overlap_chars)
    }

    pub fn max_chunk_chars(&self) -> usize {
        self.max_chunk_chars
    }

    pub fn overlap_chars(&self) -> usize {
        self.overlap_chars
    }

    /// Chunk one section's text.
    ///
    /// Every chunk is prefixed with the context header of `source` and
    /// `section`; `chunk_index`/`chunk_count` are assigned once the whole
    /// sequence is known. Whitespace-only text yields no chunks.
    pub fn chunk(&self, section: &Section, text: &str, source: &ChunkSource) -> Vec<Chunk> {
        let header = source.metadata.context_header(section.label.as_str());

        let bodies: Vec<(usize, usize)> = self
            .split_spans(text)
            .into_iter()
            .filter_map(|(start, end)| trimmed_range(text, start, end))
            .collect();

        let chunk_count = bodies.len();
        bodies
            .into_iter()
            .enumerate()
            .map(|(chunk_index, (body_start, body_end))| Chunk {
                text: format!("{}{}", header, &text[body_start..body_end]),
                body_start,
                body_end,
                chunk_index,
                chunk_count,
                source_section: section.label,
                source_document: source.filename.clone(),
                page: source.page,
                metadata: source.metadata.clone(),
            })
            .collect()
    }

    /// Raw byte spans of successive chunks, before trimming.
    ///
    /// The first span starts at 0, the last ends at `text.len()`, and each
    /// span starts at or before the end of the previous one.
    pub fn split_spans(&self, text: &str) -> Vec<(usize, usize)> {
        let mut spans = Vec::new();
        if text.trim().is_empty() {
            return spans;
        }

        let mut cursor = 0usize;
        let mut last_split = 0usize;

        loop {
            let window_end = match text[cursor..].char_indices().nth(self.max_chunk_chars) {
                Some((idx, _)) => cursor + idx,
                None => {
                    spans.push((cursor, text.len()));
                    break;
                }
            };

            let split = self.find_split(text, last_split, window_end);

            if text[split..].trim().is_empty() {
                spans.push((cursor, text.len()));
                break;
            }
            spans.push((cursor, split));

            // Never step back past the previous split, so every window makes progress
            cursor = self.overlap_start(text, split).max(last_split);
            last_split = split;
        }

        spans
    }

    /// Best split point in `(floor, window_end]`: blank line, then sentence
    /// end, then whitespace, else a forced split at the window end.
    fn find_split(&self, text: &str, floor: usize, window_end: usize) -> usize {
        let window = &text[floor..window_end];

        if let Some(m) = BLANK_LINE.find_iter(window).last() {
            return floor + m.end();
        }

        if let Some(m) = SENTENCE_END.find_iter(window).last() {
            return floor + m.end();
        }

        // A space right at the window end still counts: the chunk stops before it.
        let extended_end = text[window_end..]
            .chars()
            .next()
            .map(|c| window_end + c.len_utf8())
            .unwrap_or(window_end);

        if let Some((idx, _)) = text[floor..extended_end]
            .char_indices()
            .rev()
            .find(|&(idx, c)| idx > 0 && c.is_whitespace())
        {
            return floor + idx;
        }

        tracing::trace!("Forced split at byte {}", window_end);
        window_end
    }

    /// Start of the next chunk: `overlap_chars` before `split`, moved forward
    /// to a sentence or word start. An overlap window inside a single word
    /// yields no overlap at all rather than a word fragment.
    fn overlap_start(&self, text: &str, split: usize) -> usize {
        if self.overlap_chars == 0 {
            return split;
        }

        let start = text[..split]
            .char_indices()
            .rev()
            .nth(self.overlap_chars - 1)
            .map(|(idx, _)| idx)
            .unwrap_or(0);

        let overlap_text = &text[start..split];

        if let Some(m) = SENTENCE_END.find(overlap_text) {
            if start + m.end() < split {
                return start + m.end();
            }
        }

        let at_word_start = text[..start]
            .chars()
            .next_back()
            .map_or(true, char::is_whitespace);
        if at_word_start {
            return start;
        }

        if let Some((idx, c)) = overlap_text.char_indices().find(|(_, c)| c.is_whitespace()) {
            return start + idx + c.len_utf8();
        }

        split
    }
}

/// `[start, end)` with surrounding whitespace removed, or `None` if nothing is left
fn trimmed_range(text: &str, start: usize, end: usize) -> Option<(usize, usize)> {
    let slice = &text[start..end];
    let trimmed = slice.trim_start();
    let body_start = start + (slice.len() - trimmed.len());
    let body_end = body_start + trimmed.trim_end().len();

    (body_end > body_start).then_some((body_start, body_end))
}
