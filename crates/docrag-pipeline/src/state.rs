use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Lifecycle as seen from outside. Derived on demand, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Idle,
    Ingesting,
    Indexed,
    Querying,
}

#[derive(Debug, Default)]
pub(crate) struct StateTracker {
    ingesting: AtomicBool,
    queries: AtomicUsize,
}

impl StateTracker {
    pub(crate) fn state(&self, has_records: bool) -> PipelineState {
        if self.ingesting.load(Ordering::SeqCst) {
            PipelineState::Ingesting
        } else if self.queries.load(Ordering::SeqCst) > 0 {
            PipelineState::Querying
        } else if has_records {
            PipelineState::Indexed
        } else {
            PipelineState::Idle
        }
    }

    /// Marks an ingestion run until the guard drops. Callers hold the writer lock.
    pub(crate) fn begin_ingest(&self) -> IngestGuard<'_> {
        self.ingesting.store(true, Ordering::SeqCst);
        IngestGuard(self)
    }

    pub(crate) fn begin_query(&self) -> QueryGuard<'_> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        QueryGuard(self)
    }
}

pub(crate) struct IngestGuard<'a>(&'a StateTracker);

impl Drop for IngestGuard<'_> {
    fn drop(&mut self) {
        self.0.ingesting.store(false, Ordering::SeqCst);
    }
}

pub(crate) struct QueryGuard<'a>(&'a StateTracker);

impl Drop for QueryGuard<'_> {
    fn drop(&mut self) {
        self.0.queries.fetch_sub(1, Ordering::SeqCst);
    }
}
