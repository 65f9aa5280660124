use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{RemoteError, Result};
use crate::types::{Completion, CompletionPrompt, IndexRecord, ScoredRecord, SearchFilter, SearchHit, WriteBatch};

/// Remote embedding capability: one vector per input text, in input order.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    fn dim(&self) -> usize;
    fn model_name(&self) -> &str;
    async fn embed_batch(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, RemoteError>;
}

/// Remote chat completion capability.
#[async_trait]
pub trait CompletionService: Send + Sync {
    fn model_name(&self) -> &str;
    async fn complete(&self, prompt: &CompletionPrompt) -> std::result::Result<Completion, RemoteError>;
}

/// Lexical side of the index. `apply` commits a batch atomically.
pub trait TextIndexer: Send + Sync {
    fn apply(&self, batch: &WriteBatch) -> Result<()>;
    fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>>;
    fn len(&self) -> Result<usize>;
}

/// Semantic side of the index and owner of the records. Writes are two-phase
/// so a store can commit the lexical side in between.
pub trait VectorIndexer: Send + Sync {
    type Staged: Send;

    /// Builds (and persists, where applicable) the next snapshot without publishing it.
    fn stage(&self, batch: &WriteBatch) -> Result<Self::Staged>;
    /// Publishes a staged snapshot.
    fn commit(&self, staged: Self::Staged) -> Result<()>;
    fn search_vec(&self, query_vec: &[f32], k: usize, filter: &SearchFilter) -> Result<Vec<ScoredRecord>>;
    /// Resolves hits against the current snapshot; unknown ids are dropped.
    fn resolve(&self, hits: &[SearchHit]) -> Vec<ScoredRecord>;
    fn records(&self) -> Vec<Arc<IndexRecord>>;
    fn len(&self) -> usize;
    fn document_count(&self) -> usize;
    fn next_document_order(&self) -> u64;
    fn dimension(&self) -> Option<usize>;
}

/// Everything retrieval and ingestion need from an index.
///
/// Single writer, many readers: `apply` calls serialize, reads may run
/// concurrently and observe the last committed batch.
pub trait IndexStore: Send + Sync {
    fn apply(&self, batch: WriteBatch) -> Result<()>;

    /// Insert or replace records by chunk identity, all or nothing.
    fn upsert(&self, records: Vec<IndexRecord>) -> Result<()> {
        self.apply(WriteBatch::upsert(records))
    }

    /// Remove every record.
    fn recreate_index(&self) -> Result<()> {
        self.apply(WriteBatch::clear())
    }

    fn search(&self, query_vec: &[f32], k: usize, filter: &SearchFilter) -> Result<Vec<ScoredRecord>>;
    fn keyword_search(&self, query: &str, k: usize) -> Result<Vec<ScoredRecord>>;

    /// All records ordered by document order, then chunk index.
    fn records(&self) -> Vec<Arc<IndexRecord>>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn document_count(&self) -> usize;
    fn next_document_order(&self) -> u64;
    fn dimension(&self) -> Option<usize>;
}
