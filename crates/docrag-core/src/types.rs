//! Domain types shared by the chunker, the index store, retrieval and generation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};

pub type ChunkId = String;
pub type DocId = String;

/// Format tag derived from the source file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Text,
    Markdown,
    Rst,
    Html,
    Other,
}

impl DocumentFormat {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "txt" | "text" => Self::Text,
            "md" | "markdown" => Self::Markdown,
            "rst" => Self::Rst,
            "html" | "htm" => Self::Html,
            _ => Self::Other,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map_or(Self::Other, Self::from_extension)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Markdown => "markdown",
            Self::Rst => "rst",
            Self::Html => "html",
            Self::Other => "other",
        }
    }
}

/// A source document as ingested. Never mutated; re-ingesting the same
/// source produces a new `Document` with the same `id` that supersedes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub source: String,
    pub title: String,
    pub text: String,
    pub format: DocumentFormat,
    pub ingested_at: DateTime<Utc>,
}

impl Document {
    pub fn new(source: impl Into<String>, title: impl Into<String>, text: impl Into<String>, format: DocumentFormat) -> Self {
        let source = source.into();
        Self { id: document_id(&source), source, title: title.into(), text: text.into(), format, ingested_at: Utc::now() }
    }

    pub fn with_id(mut self, id: impl Into<DocId>) -> Self {
        self.id = id.into();
        self
    }
}

/// Stable document identity derived from its source URI: a readable stem
/// followed by a short blake3 digest of the full URI.
pub fn document_id(source: &str) -> DocId {
    let stem = Path::new(source)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let slug: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect();
    let digest = blake3::hash(source.as_bytes()).to_hex();
    let slug = if slug.is_empty() { "doc" } else { slug.as_str() };
    format!("{}-{}", slug, &digest.as_str()[..12])
}

/// Half-open `[start, end)` range in chars into a document's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// A chunk of a source document that is independently indexed.
///
/// - `id`: `"{doc_id}:{chunk_index}"`, the identity used for upserts
/// - `span`: char offsets into the owning document's text
/// - `byte_len`: UTF-8 length of `text`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub doc_id: DocId,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub span: Span,
    pub text: String,
    pub byte_len: usize,
}

pub fn chunk_id(doc_id: &str, chunk_index: usize) -> ChunkId {
    format!("{doc_id}:{chunk_index}")
}

/// A chunk with its embedding and the document metadata needed for citation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
    pub title: String,
    pub source: String,
    pub format: DocumentFormat,
    /// Position of the owning document in ingestion order; first tie-breaker after score.
    pub doc_order: u64,
    pub content_hash: String,
}

impl IndexRecord {
    pub fn new(chunk: Chunk, embedding: Vec<f32>, document: &Document, doc_order: u64) -> Self {
        let content_hash = blake3::hash(chunk.text.as_bytes()).to_hex().to_string();
        Self {
            chunk,
            embedding,
            title: document.title.clone(),
            source: document.source.clone(),
            format: document.format,
            doc_order,
            content_hash,
        }
    }

    pub fn id(&self) -> &str {
        &self.chunk.id
    }

    pub fn doc_id(&self) -> &str {
        &self.chunk.doc_id
    }
}

/// Ordering used everywhere results are ranked: descending score, then
/// document order, then chunk index. The chunk id settles anything left.
pub fn rank_cmp(a_score: f32, a: &IndexRecord, b_score: f32, b: &IndexRecord) -> Ordering {
    b_score
        .total_cmp(&a_score)
        .then_with(|| a.doc_order.cmp(&b.doc_order))
        .then_with(|| a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
        .then_with(|| a.chunk.id.cmp(&b.chunk.id))
}

/// One atomic change to an index: everything in it becomes visible together
/// or not at all. Applied in field order: `clear`, `remove_documents`, `upserts`.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    pub clear: bool,
    pub remove_documents: Vec<DocId>,
    pub upserts: Vec<IndexRecord>,
}

impl WriteBatch {
    pub fn upsert(records: Vec<IndexRecord>) -> Self {
        Self { upserts: records, ..Self::default() }
    }

    pub fn clear() -> Self {
        Self { clear: true, ..Self::default() }
    }

    /// Replace the whole index with `records`.
    pub fn rebuild(records: Vec<IndexRecord>) -> Self {
        Self { clear: true, remove_documents: Vec::new(), upserts: records }
    }

    /// Replace every chunk of the documents that `records` belong to.
    pub fn supersede(records: Vec<IndexRecord>) -> Self {
        let mut docs: Vec<DocId> = Vec::new();
        for r in &records {
            if !docs.iter().any(|d| d == r.doc_id()) {
                docs.push(r.doc_id().to_string());
            }
        }
        Self { clear: false, remove_documents: docs, upserts: records }
    }

    pub fn is_empty(&self) -> bool {
        !self.clear && self.remove_documents.is_empty() && self.upserts.is_empty()
    }
}

/// Narrows semantic search. `None` means unrestricted.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub document_ids: Option<HashSet<DocId>>,
    pub formats: Option<HashSet<DocumentFormat>>,
}

impl SearchFilter {
    pub fn documents<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<DocId>,
    {
        Self { document_ids: Some(ids.into_iter().map(Into::into).collect()), formats: None }
    }

    pub fn matches(&self, record: &IndexRecord) -> bool {
        self.document_ids.as_ref().map_or(true, |ids| ids.contains(record.doc_id()))
            && self.formats.as_ref().map_or(true, |f| f.contains(&record.format))
    }
}

/// Indicates which engine produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SourceKind {
    Vector,
    Text,
}

/// Raw engine hit. `id` matches `Chunk::id`; `score` is engine-specific but
/// higher is always better.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: ChunkId,
    pub score: f32,
    pub source: SourceKind,
}

/// A hit resolved to the record it refers to.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub record: Arc<IndexRecord>,
    pub score: f32,
}

/// Relative weight of the semantic and lexical signals in hybrid fusion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    pub semantic: f32,
    pub lexical: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self { semantic: 0.5, lexical: 0.5 }
    }
}

impl FusionWeights {
    pub fn new(semantic: f32, lexical: f32) -> Self {
        Self { semantic, lexical }
    }

    /// Weights scaled to sum to one.
    pub fn normalized(self) -> Result<Self> {
        let valid = |w: f32| w.is_finite() && w >= 0.0;
        if !valid(self.semantic) || !valid(self.lexical) {
            return Err(Error::InvalidConfiguration(format!(
                "fusion weights must be finite and non-negative, got semantic={} lexical={}",
                self.semantic, self.lexical
            )));
        }
        let total = self.semantic + self.lexical;
        if total <= 0.0 {
            return Err(Error::InvalidConfiguration("fusion weights must not both be zero".into()));
        }
        Ok(Self { semantic: self.semantic / total, lexical: self.lexical / total })
    }
}

/// A retrieval question.
#[derive(Debug, Clone)]
pub struct Query {
    pub text: String,
    /// Computed by the retriever when absent.
    pub embedding: Option<Vec<f32>>,
    pub k: usize,
    pub weights: Option<FusionWeights>,
    pub filter: SearchFilter,
}

impl Query {
    pub fn new(text: impl Into<String>, k: usize) -> Self {
        Self { text: text.into(), embedding: None, k, weights: None, filter: SearchFilter::default() }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_weights(mut self, weights: FusionWeights) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn with_filter(mut self, filter: SearchFilter) -> Self {
        self.filter = filter;
        self
    }
}

#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub record: Arc<IndexRecord>,
    /// Fused score used for ranking.
    pub score: f32,
    pub semantic: f32,
    pub lexical: f32,
}

/// Ranked retrieval output; scores are non-increasing.
#[derive(Debug, Clone, Default)]
pub struct RetrievalResult {
    pub hits: Vec<RetrievedChunk>,
}

impl RetrievalResult {
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RetrievedChunk> {
        self.hits.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitedSource {
    pub document_id: DocId,
    pub title: String,
    pub source: String,
    pub score: f32,
    /// Opening characters of the document's first chunk in the context.
    #[serde(default)]
    pub preview: String,
}

/// Context handed to generation: the rendered text plus its provenance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssembledContext {
    pub text: String,
    pub sources: Vec<CitedSource>,
    pub token_count: usize,
    pub chunk_ids: Vec<ChunkId>,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self { temperature: 0.7, max_tokens: 500 }
    }
}

impl GenerationParams {
    pub fn validate(&self, model_max_tokens: u32) -> Result<()> {
        if !self.temperature.is_finite() || !(0.0..=1.0).contains(&self.temperature) {
            return Err(Error::InvalidRequest(format!(
                "temperature must be within [0.0, 1.0], got {}",
                self.temperature
            )));
        }
        if self.max_tokens < 1 || self.max_tokens > model_max_tokens {
            return Err(Error::InvalidRequest(format!(
                "max_tokens must be within [1, {model_max_tokens}], got {}",
                self.max_tokens
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Overrides the configured default system prompt when set.
    pub system_prompt: Option<String>,
    pub context: AssembledContext,
    pub message: String,
    pub params: GenerationParams,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub answer: String,
    pub sources: Vec<CitedSource>,
    pub usage: TokenUsage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }
}

/// What a completion service is asked to do.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionPrompt {
    pub messages: Vec<ChatMessage>,
    pub params: GenerationParams,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
}
