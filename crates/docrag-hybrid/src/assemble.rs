use std::collections::HashSet;
use tracing::debug;

use docrag_core::tokens::estimate_tokens;
use docrag_core::types::{AssembledContext, CitedSource, IndexRecord, RetrievalResult};

pub const BLOCK_SEPARATOR: &str = "\n\n";
pub const PREVIEW_CHARS: usize = 200;

pub fn render_block(record: &IndexRecord) -> String {
    format!("Document: {}\nContent: {}", record.title, record.chunk.text)
}

/// The first [`PREVIEW_CHARS`] characters of `text`, with "..." when cut.
pub fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Packs ranked chunks into a prompt context without exceeding `token_budget`.
///
/// Chunks are taken whole, in rank order, until the next one would not fit.
/// Sources are listed once per document, in first-appearance order, with the
/// score of that document's best chunk.
pub fn assemble(result: &RetrievalResult, token_budget: usize) -> AssembledContext {
    let mut blocks: Vec<String> = Vec::new();
    let mut chunk_ids = Vec::new();
    let mut sources: Vec<CitedSource> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut used = 0usize;

    for hit in result.iter() {
        let block = render_block(&hit.record);
        let cost = estimate_tokens(&block);
        if used + cost > token_budget {
            debug!(used, cost, token_budget, "context budget reached");
            break;
        }
        used += cost;
        blocks.push(block);
        chunk_ids.push(hit.record.chunk.id.clone());
        if seen.insert(hit.record.doc_id()) {
            sources.push(CitedSource {
                document_id: hit.record.doc_id().to_string(),
                title: hit.record.title.clone(),
                source: hit.record.source.clone(),
                score: hit.score,
                preview: preview(&hit.record.chunk.text),
            });
        }
    }

    let text = blocks.join(BLOCK_SEPARATOR);
    let token_count = estimate_tokens(&text);
    AssembledContext { text, sources, token_count, chunk_ids }
}
