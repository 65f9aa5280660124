//! Hybrid retrieval: semantic and BM25 candidates, max-normalized per engine
//! and combined with configurable weights.
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use docrag_core::retry::Deadline;
use docrag_core::settings::RetrievalSettings;
use docrag_core::traits::IndexStore;
use docrag_core::types::{rank_cmp, ChunkId, FusionWeights, IndexRecord, Query, RetrievalResult, RetrievedChunk, ScoredRecord};
use docrag_core::{Error, Result};
use docrag_embed::EmbeddingClient;

#[derive(Clone)]
pub struct Retriever {
    store: Arc<dyn IndexStore>,
    embeddings: EmbeddingClient,
    weights: FusionWeights,
    candidate_multiplier: usize,
}

impl Retriever {
    pub fn new(store: Arc<dyn IndexStore>, embeddings: EmbeddingClient, settings: &RetrievalSettings) -> Result<Self> {
        Ok(Self {
            store,
            embeddings,
            weights: settings.weights().normalized()?,
            candidate_multiplier: settings.candidate_multiplier.max(1),
        })
    }

    pub fn store(&self) -> &Arc<dyn IndexStore> {
        &self.store
    }

    pub fn weights(&self) -> FusionWeights {
        self.weights
    }

    /// Top `query.k` chunks by fused score. An empty index or `k = 0` gives an
    /// empty result without calling the embedding service.
    pub async fn retrieve(&self, query: &Query, deadline: Deadline) -> Result<RetrievalResult> {
        if query.k == 0 || self.store.is_empty() {
            return Ok(RetrievalResult::default());
        }
        let weights = match query.weights {
            Some(w) => w.normalized()?,
            None => self.weights,
        };
        let embedding = match &query.embedding {
            Some(e) => e.clone(),
            None => {
                if query.text.trim().is_empty() {
                    return Err(Error::InvalidRequest("query text must not be blank".into()));
                }
                self.embeddings.embed_query(&query.text, deadline).await?
            }
        };
        let candidates = query.k.saturating_mul(self.candidate_multiplier);
        let semantic = self.store.search(&embedding, candidates, &query.filter)?;
        let lexical: Vec<ScoredRecord> = self
            .store
            .keyword_search(&query.text, candidates)?
            .into_iter()
            .filter(|c| query.filter.matches(&c.record))
            .collect();
        let hits = fuse(&semantic, &lexical, weights, query.k);
        debug!(semantic = semantic.len(), lexical = lexical.len(), returned = hits.len(), k = query.k, "retrieved");
        Ok(RetrievalResult { hits })
    }
}

struct Candidate {
    record: Arc<IndexRecord>,
    semantic: f32,
    lexical: f32,
}

fn max_by_id(set: &[ScoredRecord], raw: impl Fn(f32) -> f32) -> HashMap<&str, (&Arc<IndexRecord>, f32)> {
    let mut best: HashMap<&str, (&Arc<IndexRecord>, f32)> = HashMap::new();
    for c in set {
        let score = raw(c.score);
        best.entry(c.record.id())
            .and_modify(|slot| {
                if score > slot.1 {
                    slot.1 = score;
                }
            })
            .or_insert((&c.record, score));
    }
    best
}

fn normalizer(scores: impl Iterator<Item = f32>) -> f32 {
    scores.fold(0.0f32, f32::max)
}

/// Fuses two candidate sets into at most `k` ranked chunks.
///
/// Each engine's scores are divided by that engine's maximum (cosine is first
/// clamped at zero); a chunk missing from one set gets zero for that side.
pub fn fuse(semantic: &[ScoredRecord], lexical: &[ScoredRecord], weights: FusionWeights, k: usize) -> Vec<RetrievedChunk> {
    if k == 0 {
        return Vec::new();
    }
    let sem = max_by_id(semantic, |s| if s.is_finite() { s.max(0.0) } else { 0.0 });
    let lex = max_by_id(lexical, |s| if s.is_finite() { s.max(0.0) } else { 0.0 });
    let sem_max = normalizer(sem.values().map(|v| v.1));
    let lex_max = normalizer(lex.values().map(|v| v.1));
    let scale = |raw: f32, max: f32| if max > 0.0 { raw / max } else { 0.0 };

    let mut merged: HashMap<ChunkId, Candidate> = HashMap::new();
    for (id, (record, raw)) in &sem {
        merged.insert(id.to_string(), Candidate { record: Arc::clone(record), semantic: scale(*raw, sem_max), lexical: 0.0 });
    }
    for (id, (record, raw)) in &lex {
        let lexical = scale(*raw, lex_max);
        merged
            .entry(id.to_string())
            .and_modify(|c| c.lexical = lexical)
            .or_insert_with(|| Candidate { record: Arc::clone(record), semantic: 0.0, lexical });
    }

    let mut hits: Vec<RetrievedChunk> = merged
        .into_values()
        .map(|c| RetrievedChunk {
            score: weights.semantic * c.semantic + weights.lexical * c.lexical,
            record: c.record,
            semantic: c.semantic,
            lexical: c.lexical,
        })
        .collect();
    hits.sort_by(|a, b| rank_cmp(a.score, &a.record, b.score, &b.record));
    hits.truncate(k);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrag_core::types::{chunk_id, Chunk, Document, DocumentFormat, Span};

    fn record(doc: &str, index: usize, order: u64) -> Arc<IndexRecord> {
        let document = Document::new(doc, doc, "text", DocumentFormat::Text);
        let chunk = Chunk {
            id: chunk_id(&document.id, index),
            doc_id: document.id.clone(),
            chunk_index: index,
            total_chunks: 4,
            span: Span { start: 0, end: 4 },
            text: "text".into(),
            byte_len: 4,
        };
        Arc::new(IndexRecord::new(chunk, vec![1.0], &document, order))
    }

    fn scored(record: &Arc<IndexRecord>, score: f32) -> ScoredRecord {
        ScoredRecord { record: Arc::clone(record), score }
    }

    #[test]
    fn scores_are_max_normalized_and_weighted() {
        let (a, b, c) = (record("a", 0, 0), record("b", 0, 1), record("c", 0, 2));
        let semantic = vec![scored(&a, 0.8), scored(&b, 0.4), scored(&c, -0.3)];
        let lexical = vec![scored(&b, 6.0), scored(&c, 3.0)];
        let hits = fuse(&semantic, &lexical, FusionWeights::default(), 10);
        let got: Vec<(&str, f32)> = hits.iter().map(|h| (h.record.source.as_str(), h.score)).collect();
        // a: 0.5*1.0, b: 0.5*0.5 + 0.5*1.0, c: 0 + 0.5*0.5
        assert_eq!(got.len(), 3);
        assert_eq!(got[0].0, "b");
        assert!((got[0].1 - 0.75).abs() < 1e-6);
        assert_eq!(got[1].0, "a");
        assert!((got[1].1 - 0.5).abs() < 1e-6);
        assert_eq!(got[2].0, "c");
        assert!((got[2].1 - 0.25).abs() < 1e-6);
    }

    #[test]
    fn duplicates_keep_their_best_score() {
        let a = record("a", 0, 0);
        let hits = fuse(&[scored(&a, 0.2), scored(&a, 0.9)], &[], FusionWeights::new(1.0, 0.0), 5);
        assert_eq!(hits.len(), 1);
        assert!((hits[0].semantic - 1.0).abs() < 1e-6);
    }

    #[test]
    fn ties_resolve_by_document_order_then_chunk_index() {
        let records = [record("z", 1, 0), record("y", 0, 1), record("z", 0, 0)];
        let semantic: Vec<ScoredRecord> = records.iter().map(|r| scored(r, 0.5)).collect();
        let hits = fuse(&semantic, &[], FusionWeights::default(), 3);
        let order: Vec<(u64, usize)> = hits.iter().map(|h| (h.record.doc_order, h.record.chunk.chunk_index)).collect();
        assert_eq!(order, vec![(0, 0), (0, 1), (1, 0)]);
    }

    #[test]
    fn zero_k_or_no_candidates_is_empty() {
        let a = record("a", 0, 0);
        assert!(fuse(&[scored(&a, 1.0)], &[], FusionWeights::default(), 0).is_empty());
        assert!(fuse(&[], &[], FusionWeights::default(), 3).is_empty());
    }

    #[test]
    fn all_zero_scores_do_not_divide_by_zero() {
        let a = record("a", 0, 0);
        let hits = fuse(&[scored(&a, -0.5)], &[], FusionWeights::default(), 3);
        assert_eq!(hits[0].score, 0.0);
    }
}
