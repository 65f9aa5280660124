use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use docrag_core::traits::VectorIndexer;
use docrag_core::types::{rank_cmp, ChunkId, IndexRecord, ScoredRecord, SearchFilter, SearchHit, WriteBatch};
use docrag_core::{Error, Result};

use crate::persist::{self, RECORDS_FILE};
use crate::similarity::cosine;

/// Immutable view of the index. Readers clone the `Arc` and never block writers.
#[derive(Debug, Default)]
struct Snapshot {
    /// Ordered by document order, then chunk index.
    records: Vec<Arc<IndexRecord>>,
    by_id: HashMap<ChunkId, usize>,
    dimension: Option<usize>,
}

impl Snapshot {
    fn build(mut records: Vec<Arc<IndexRecord>>, dimension: Option<usize>) -> Self {
        records.sort_by(|a, b| {
            a.doc_order
                .cmp(&b.doc_order)
                .then_with(|| a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
                .then_with(|| a.chunk.id.cmp(&b.chunk.id))
        });
        let by_id = records.iter().enumerate().map(|(i, r)| (r.chunk.id.clone(), i)).collect();
        let dimension = if records.is_empty() { None } else { dimension };
        Self { records, by_id, dimension }
    }

    fn get(&self, id: &str) -> Option<&Arc<IndexRecord>> {
        self.by_id.get(id).map(|&i| &self.records[i])
    }
}

/// A snapshot built from a batch but not yet visible to readers.
pub struct StagedSnapshot {
    snapshot: Snapshot,
    file: Option<NamedTempFile>,
}

pub struct VectorIndex {
    current: RwLock<Arc<Snapshot>>,
    records_path: Option<PathBuf>,
}

impl Default for VectorIndex {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl VectorIndex {
    pub fn in_memory() -> Self {
        Self { current: RwLock::new(Arc::new(Snapshot::default())), records_path: None }
    }

    /// Opens (or starts) a persistent index whose records live in `dir/records.json`.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let records_path = dir.join(RECORDS_FILE);
        let snapshot = match persist::load(&records_path)? {
            Some((dimension, records)) => {
                info!(path = %records_path.display(), records = records.len(), "loaded vector snapshot");
                Snapshot::build(records.into_iter().map(Arc::new).collect(), dimension)
            }
            None => Snapshot::default(),
        };
        Ok(Self { current: RwLock::new(Arc::new(snapshot)), records_path: Some(records_path) })
    }

    pub fn records_path(&self) -> Option<&Path> {
        self.records_path.as_deref()
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Dimension every upsert must share; fixed by the first record of an empty index.
    fn batch_dimension(base: Option<usize>, batch: &WriteBatch) -> Result<Option<usize>> {
        let mut dimension = base;
        for record in &batch.upserts {
            let actual = record.embedding.len();
            if actual == 0 {
                return Err(Error::InvalidRequest(format!("record {} has an empty embedding", record.id())));
            }
            match dimension {
                Some(expected) if expected != actual => return Err(Error::DimensionMismatch { expected, actual }),
                Some(_) => {}
                None => dimension = Some(actual),
            }
        }
        Ok(dimension)
    }
}

impl VectorIndexer for VectorIndex {
    type Staged = StagedSnapshot;

    fn stage(&self, batch: &WriteBatch) -> Result<StagedSnapshot> {
        let current = self.snapshot();
        let removed: HashSet<&str> = batch.remove_documents.iter().map(String::as_str).collect();
        let mut merged: HashMap<ChunkId, Arc<IndexRecord>> = if batch.clear {
            HashMap::new()
        } else {
            current
                .records
                .iter()
                .filter(|r| !removed.contains(r.doc_id()))
                .map(|r| (r.chunk.id.clone(), Arc::clone(r)))
                .collect()
        };
        let base_dimension = if merged.is_empty() { None } else { current.dimension };
        let dimension = Self::batch_dimension(base_dimension, batch)?;
        for record in &batch.upserts {
            merged.insert(record.chunk.id.clone(), Arc::new(record.clone()));
        }
        let snapshot = Snapshot::build(merged.into_values().collect(), dimension);
        let file = match &self.records_path {
            Some(path) => Some(persist::write_staged(path, snapshot.dimension, snapshot.records.iter().map(|r| r.as_ref()))?),
            None => None,
        };
        debug!(records = snapshot.records.len(), dimension = ?snapshot.dimension, "staged vector snapshot");
        Ok(StagedSnapshot { snapshot, file })
    }

    fn commit(&self, staged: StagedSnapshot) -> Result<()> {
        if let (Some(path), Some(file)) = (&self.records_path, staged.file) {
            persist::publish(file, path)?;
        }
        let mut guard = self.current.write().map_err(|_| Error::index_unavailable("vector snapshot lock poisoned"))?;
        *guard = Arc::new(staged.snapshot);
        Ok(())
    }

    fn search_vec(&self, query_vec: &[f32], k: usize, filter: &SearchFilter) -> Result<Vec<ScoredRecord>> {
        let snapshot = self.snapshot();
        if k == 0 || snapshot.records.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(expected) = snapshot.dimension {
            if query_vec.len() != expected {
                return Err(Error::DimensionMismatch { expected, actual: query_vec.len() });
            }
        }
        let mut scored: Vec<ScoredRecord> = snapshot
            .records
            .iter()
            .filter(|r| filter.matches(r))
            .map(|r| ScoredRecord { record: Arc::clone(r), score: cosine(query_vec, &r.embedding) })
            .collect();
        scored.sort_by(|a, b| rank_cmp(a.score, &a.record, b.score, &b.record));
        scored.truncate(k);
        Ok(scored)
    }

    fn resolve(&self, hits: &[SearchHit]) -> Vec<ScoredRecord> {
        let snapshot = self.snapshot();
        hits.iter()
            .filter_map(|h| snapshot.get(&h.id).map(|r| ScoredRecord { record: Arc::clone(r), score: h.score }))
            .collect()
    }

    fn records(&self) -> Vec<Arc<IndexRecord>> {
        self.snapshot().records.clone()
    }

    fn len(&self) -> usize {
        self.snapshot().records.len()
    }

    fn document_count(&self) -> usize {
        let snapshot = self.snapshot();
        snapshot.records.iter().map(|r| r.doc_id()).collect::<HashSet<_>>().len()
    }

    fn next_document_order(&self) -> u64 {
        self.snapshot().records.iter().map(|r| r.doc_order + 1).max().unwrap_or(0)
    }

    fn dimension(&self) -> Option<usize> {
        self.snapshot().dimension
    }
}
