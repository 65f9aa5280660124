use serde::{Deserialize, Serialize};

use docrag_core::chunker::ChunkingConfig;
use docrag_core::loader::DocumentSource;
use docrag_core::types::SearchFilter;

/// One ingestion run. Chunking falls back to the configured defaults.
#[derive(Debug, Clone, Default)]
pub struct IngestRequest {
    pub sources: Vec<DocumentSource>,
    pub chunk_size: Option<usize>,
    pub chunk_overlap: Option<usize>,
    /// Drop everything already indexed before writing this run's records.
    pub recreate_index: bool,
}

impl IngestRequest {
    pub fn new(sources: Vec<DocumentSource>) -> Self {
        Self { sources, ..Self::default() }
    }

    pub fn with_chunking(mut self, size: usize, overlap: usize) -> Self {
        self.chunk_size = Some(size);
        self.chunk_overlap = Some(overlap);
        self
    }

    pub fn recreate(mut self) -> Self {
        self.recreate_index = true;
        self
    }

    pub fn chunking(&self, defaults: ChunkingConfig) -> ChunkingConfig {
        ChunkingConfig {
            size: self.chunk_size.unwrap_or(defaults.size),
            overlap: self.chunk_overlap.unwrap_or(defaults.overlap),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    pub recreated: bool,
    /// Store totals after the run.
    pub total_documents: usize,
    pub total_records: usize,
    pub elapsed_ms: u64,
}

/// A question plus optional per-request overrides of the configured defaults.
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    pub message: String,
    pub system_prompt: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub k: Option<usize>,
    pub filter: SearchFilter,
}

impl QueryRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), ..Self::default() }
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = Some(k);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}
