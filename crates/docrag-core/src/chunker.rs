//! Fixed-window chunking with overlap.
//!
//! Sizes and offsets are counted in chars (Unicode scalar values). A window
//! of `size` chars slides forward by `size - overlap`; the last window is
//! truncated at the end of the text and is never padded, and sliding stops
//! as soon as a window reaches the end. Consecutive spans therefore satisfy
//! `start[i + 1] = start[i] + (size - overlap)` and together cover the text.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{chunk_id, Chunk, Document, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { size: 1000, overlap: 200 }
    }
}

impl ChunkingConfig {
    pub fn new(size: usize, overlap: usize) -> Result<Self> {
        let config = Self { size, overlap };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(Error::InvalidConfiguration("chunk size must be greater than zero".into()));
        }
        if self.overlap >= self.size {
            return Err(Error::InvalidConfiguration(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                self.overlap, self.size
            )));
        }
        Ok(())
    }

    pub fn stride(&self) -> usize {
        self.size - self.overlap
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> ChunkingConfig {
        self.config
    }

    pub fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let text = document.text.as_str();
        // byte offset of every char boundary, including the end of the text
        let offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();
        let spans = window_spans(offsets.len() - 1, self.config.size, self.config.stride());
        let total_chunks = spans.len();
        spans
            .into_iter()
            .enumerate()
            .map(|(chunk_index, span)| {
                let slice = &text[offsets[span.start]..offsets[span.end]];
                Chunk {
                    id: chunk_id(&document.id, chunk_index),
                    doc_id: document.id.clone(),
                    chunk_index,
                    total_chunks,
                    span,
                    text: slice.to_string(),
                    byte_len: slice.len(),
                }
            })
            .collect()
    }
}

/// Splits `document` into overlapping chunks of `size` chars.
pub fn chunk(document: &Document, size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    Ok(Chunker::new(ChunkingConfig::new(size, overlap)?)?.chunk(document))
}

fn window_spans(len: usize, size: usize, stride: usize) -> Vec<Span> {
    let mut spans = Vec::new();
    if len == 0 {
        return spans;
    }
    let mut start = 0;
    loop {
        let end = (start + size).min(len);
        spans.push(Span { start, end });
        if end == len {
            break;
        }
        start += stride;
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DocumentFormat;

    fn doc(text: &str) -> Document {
        Document::new("mem://fox.txt", "fox", text, DocumentFormat::Text)
    }

    fn assert_covering(chunks: &[Chunk], len: usize, config: ChunkingConfig) {
        assert_eq!(chunks.first().map(|c| c.span.start), Some(0));
        assert_eq!(chunks.last().map(|c| c.span.end), Some(len));
        for pair in chunks.windows(2) {
            assert_eq!(pair[1].span.start - pair[0].span.start, config.stride());
            assert!(pair[1].span.start <= pair[0].span.end, "gap between chunks");
            assert_eq!(pair[0].span.len(), config.size);
        }
    }

    #[test]
    fn fox_sentence_splits_into_three_windows() {
        let d = doc("The quick brown fox jumps over the lazy dog.");
        let chunks = chunk(&d, 20, 5).expect("chunk");
        let spans: Vec<(usize, usize)> = chunks.iter().map(|c| (c.span.start, c.span.end)).collect();
        assert_eq!(spans, vec![(0, 20), (15, 35), (30, 44)]);
        assert_eq!(chunks[0].text, "The quick brown fox ");
        assert_eq!(chunks[2].text, "the lazy dog.");
        assert!(chunks.iter().all(|c| c.total_chunks == 3));
        assert_eq!(chunks[1].id, format!("{}:1", d.id));
    }

    #[test]
    fn short_document_is_a_single_chunk() {
        let d = doc("tiny");
        let chunks = chunk(&d, 20, 5).expect("chunk");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "tiny");
        assert_eq!(chunks[0].span, Span { start: 0, end: 4 });
    }

    #[test]
    fn exact_multiple_does_not_emit_a_trailing_sliver() {
        let d = doc(&"a".repeat(35));
        let chunks = chunk(&d, 20, 5).expect("chunk");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].span, Span { start: 15, end: 35 });
    }

    #[test]
    fn empty_document_yields_nothing() {
        assert!(chunk(&doc(""), 10, 0).expect("chunk").is_empty());
    }

    #[test]
    fn spans_are_char_offsets_and_slices_stay_on_boundaries() {
        let text = "héllo wörld ünïcode tëxt çhunks ñ";
        let d = doc(text);
        let config = ChunkingConfig::new(7, 3).expect("config");
        let chunks = Chunker::new(config).expect("chunker").chunk(&d);
        assert_covering(&chunks, text.chars().count(), config);
        for c in &chunks {
            let expected: String = text.chars().skip(c.span.start).take(c.span.len()).collect();
            assert_eq!(c.text, expected);
            assert_eq!(c.byte_len, c.text.len());
        }
    }

    #[test]
    fn coverage_holds_across_sizes() {
        let text: String = (0..500).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let d = doc(&text);
        for (size, overlap) in [(1, 0), (7, 6), (50, 10), (64, 0), (499, 1), (500, 100), (600, 50)] {
            let config = ChunkingConfig::new(size, overlap).expect("config");
            let chunks = Chunker::new(config).expect("chunker").chunk(&d);
            assert_covering(&chunks, 500, config);
        }
    }

    #[test]
    fn chunking_is_deterministic() {
        let d = doc("Determinism matters for idempotent re-indexing of the same text.");
        assert_eq!(chunk(&d, 16, 4).expect("chunk"), chunk(&d, 16, 4).expect("chunk"));
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let d = doc("text");
        assert!(matches!(chunk(&d, 0, 0), Err(Error::InvalidConfiguration(_))));
        assert!(matches!(chunk(&d, 10, 10), Err(Error::InvalidConfiguration(_))));
        assert!(matches!(chunk(&d, 10, 11), Err(Error::InvalidConfiguration(_))));
    }
}
