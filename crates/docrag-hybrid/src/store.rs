use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{info, warn};

use docrag_core::traits::{IndexStore, TextIndexer, VectorIndexer};
use docrag_core::types::{rank_cmp, IndexRecord, ScoredRecord, SearchFilter, WriteBatch};
use docrag_core::{Error, Result};
use docrag_text::TantivyKeywordIndex;
use docrag_vector::VectorIndex;

pub const KEYWORD_DIR: &str = "keyword";
pub const VECTOR_DIR: &str = "vectors";

/// Keyword and vector sides behind one writer. The vector side owns the
/// records; the keyword side only maps terms to chunk ids.
///
/// `published` is held for writing while the two sides switch over and for
/// reading across a keyword search plus its resolution, so a keyword hit is
/// always resolved against the snapshot it was scored in.
pub struct HybridIndexStore<TI, VI>
where
    TI: TextIndexer,
    VI: VectorIndexer,
{
    text: TI,
    vector: VI,
    writer: Mutex<()>,
    published: RwLock<()>,
}

pub type LocalIndexStore = HybridIndexStore<TantivyKeywordIndex, VectorIndex>;

impl HybridIndexStore<TantivyKeywordIndex, VectorIndex> {
    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(TantivyKeywordIndex::new_in_ram()?, VectorIndex::in_memory()))
    }

    /// Opens `dir/keyword` and `dir/vectors`, creating them when missing.
    pub fn open(dir: &Path) -> Result<Self> {
        let text = TantivyKeywordIndex::open_or_create(&dir.join(KEYWORD_DIR))?;
        let vector = VectorIndex::open(&dir.join(VECTOR_DIR))?;
        let store = Self::new(text, vector);
        store.reconcile()?;
        info!(dir = %dir.display(), records = store.len(), documents = store.document_count(), "opened index store");
        Ok(store)
    }
}

impl<TI, VI> HybridIndexStore<TI, VI>
where
    TI: TextIndexer,
    VI: VectorIndexer,
{
    pub fn new(text: TI, vector: VI) -> Self {
        Self { text, vector, writer: Mutex::new(()), published: RwLock::new(()) }
    }

    pub fn text(&self) -> &TI {
        &self.text
    }

    pub fn vector(&self) -> &VI {
        &self.vector
    }

    /// Rebuilds the keyword side from the records when the two disagree,
    /// which only happens if a previous process died between commits.
    pub fn reconcile(&self) -> Result<()> {
        let (keyword, records) = (self.text.len()?, self.vector.len());
        if keyword == records {
            return Ok(());
        }
        warn!(keyword, records, "keyword index out of step with records; rebuilding it");
        let _published = self.published.write().map_err(|_| Error::index_unavailable("index publish lock poisoned"))?;
        self.text.apply(&WriteBatch::rebuild(self.owned_records()))
    }

    fn owned_records(&self) -> Vec<IndexRecord> {
        self.vector.records().iter().map(|r| r.as_ref().clone()).collect()
    }
}

impl<TI, VI> IndexStore for HybridIndexStore<TI, VI>
where
    TI: TextIndexer,
    VI: VectorIndexer,
{
    fn apply(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let _writer = self.writer.lock().map_err(|_| Error::index_unavailable("index writer lock poisoned"))?;
        let staged = self.vector.stage(&batch)?;
        let published = self.published.write().map_err(|_| Error::index_unavailable("index publish lock poisoned"))?;
        self.text.apply(&batch)?;
        if let Err(e) = self.vector.commit(staged) {
            warn!(error = %e, "vector commit failed after keyword commit; restoring keyword side");
            if let Err(restore) = self.text.apply(&WriteBatch::rebuild(self.owned_records())) {
                warn!(error = %restore, "keyword restore failed; index stays inconsistent until reopened");
            }
            return Err(Error::index_unavailable(format!("vector commit failed: {e}")));
        }
        drop(published);
        info!(
            clear = batch.clear,
            removed_documents = batch.remove_documents.len(),
            upserts = batch.upserts.len(),
            records = self.vector.len(),
            "index batch applied"
        );
        Ok(())
    }

    fn search(&self, query_vec: &[f32], k: usize, filter: &SearchFilter) -> Result<Vec<ScoredRecord>> {
        self.vector.search_vec(query_vec, k, filter)
    }

    fn keyword_search(&self, query: &str, k: usize) -> Result<Vec<ScoredRecord>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let mut resolved = {
            let _published = self.published.read().map_err(|_| Error::index_unavailable("index publish lock poisoned"))?;
            let hits = self.text.search(query, k)?;
            self.vector.resolve(&hits)
        };
        resolved.sort_by(|a, b| rank_cmp(a.score, &a.record, b.score, &b.record));
        Ok(resolved)
    }

    fn records(&self) -> Vec<Arc<IndexRecord>> {
        self.vector.records()
    }

    fn len(&self) -> usize {
        self.vector.len()
    }

    fn document_count(&self) -> usize {
        self.vector.document_count()
    }

    fn next_document_order(&self) -> u64 {
        self.vector.next_document_order()
    }

    fn dimension(&self) -> Option<usize> {
        self.vector.dimension()
    }
}
