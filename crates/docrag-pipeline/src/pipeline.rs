use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use docrag_core::chunker::{Chunker, ChunkingConfig};
use docrag_core::loader::DocumentLoader;
use docrag_core::retry::Deadline;
use docrag_core::settings::RagSettings;
use docrag_core::traits::{CompletionService, EmbeddingService, IndexStore};
use docrag_core::types::{
    GenerationParams, GenerationRequest, GenerationResponse, IndexRecord, Query, RetrievalResult, TokenUsage, WriteBatch,
};
use docrag_core::{Error, Result};
use docrag_embed::EmbeddingClient;
use docrag_generate::Generator;
use docrag_hybrid::{assemble, Retriever};

use crate::request::{IngestReport, IngestRequest, QueryRequest};
use crate::state::{PipelineState, StateTracker};

pub const NO_CONTEXT_ANSWER: &str = "I couldn't find any relevant information in the documentation to answer your question.";

pub struct RagPipeline {
    settings: RagSettings,
    store: Arc<dyn IndexStore>,
    loader: DocumentLoader,
    embeddings: EmbeddingClient,
    retriever: Retriever,
    generator: Option<Generator>,
    writer: Mutex<()>,
    tracker: StateTracker,
}

impl RagPipeline {
    pub fn new(
        store: Arc<dyn IndexStore>,
        embedding: Arc<dyn EmbeddingService>,
        completion: Arc<dyn CompletionService>,
        settings: &RagSettings,
    ) -> Result<Self> {
        let generator = Generator::from_settings(completion, &settings.generation);
        Self::build(store, embedding, Some(generator), settings)
    }

    /// A pipeline that can ingest and retrieve but has no completion service;
    /// `query` fails with `InvalidConfiguration`.
    pub fn without_generation(store: Arc<dyn IndexStore>, embedding: Arc<dyn EmbeddingService>, settings: &RagSettings) -> Result<Self> {
        Self::build(store, embedding, None, settings)
    }

    fn build(
        store: Arc<dyn IndexStore>,
        embedding: Arc<dyn EmbeddingService>,
        generator: Option<Generator>,
        settings: &RagSettings,
    ) -> Result<Self> {
        settings.validate()?;
        if let Some(indexed) = store.dimension() {
            if indexed != embedding.dim() {
                return Err(Error::DimensionMismatch { expected: indexed, actual: embedding.dim() });
            }
        }
        let embeddings = EmbeddingClient::from_settings(embedding, &settings.embedding);
        let retriever = Retriever::new(Arc::clone(&store), embeddings.clone(), &settings.retrieval)?;
        Ok(Self {
            settings: settings.clone(),
            store,
            loader: DocumentLoader::default(),
            embeddings,
            retriever,
            generator,
            writer: Mutex::new(()),
            tracker: StateTracker::default(),
        })
    }

    pub fn with_loader(mut self, loader: DocumentLoader) -> Self {
        self.loader = loader;
        self
    }

    pub fn settings(&self) -> &RagSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn IndexStore> {
        &self.store
    }

    pub fn can_generate(&self) -> bool {
        self.generator.is_some()
    }

    pub fn state(&self) -> PipelineState {
        self.tracker.state(!self.store.is_empty())
    }

    /// Loads, chunks and embeds every source, then writes one batch.
    ///
    /// Nothing is written unless every document succeeds; on error the index
    /// keeps its previous contents. `deadline` bounds the embedding calls.
    pub async fn ingest(&self, request: IngestRequest, deadline: Deadline) -> Result<IngestReport> {
        let chunking: ChunkingConfig = request.chunking(self.settings.chunking);
        let chunker = Chunker::new(chunking)?;
        if request.sources.is_empty() && !request.recreate_index {
            return Err(Error::InvalidRequest("ingestion needs at least one source".into()));
        }

        let _writer = self.writer.lock().await;
        let _ingesting = self.tracker.begin_ingest();
        let started = Instant::now();
        info!(sources = request.sources.len(), size = chunking.size, overlap = chunking.overlap, recreate = request.recreate_index, "ingestion started");

        let mut seen = HashSet::new();
        let mut documents = Vec::new();
        for source in &request.sources {
            let loaded = self
                .loader
                .load(source)
                .map_err(|e| Error::Ingestion { document: source.describe(), cause: Box::new(e) })?;
            for doc in loaded {
                if seen.insert(doc.id.clone()) {
                    documents.push(doc);
                } else {
                    warn!(source = %doc.source, "document listed twice in one run; keeping the first");
                }
            }
        }

        let chunked: Vec<_> = documents.iter().map(|doc| chunker.chunk(doc)).collect();
        let texts: Vec<String> = chunked.iter().flatten().map(|c| c.text.clone()).collect();
        debug!(documents = documents.len(), chunks = texts.len(), "chunked documents");
        let mut vectors = self.embeddings.embed_with_deadline(&texts, deadline).await?.into_iter();

        let base = if request.recreate_index { 0 } else { self.store.next_document_order() };
        let mut records = Vec::with_capacity(texts.len());
        for (offset, (doc, chunks)) in (0u64..).zip(documents.iter().zip(chunked)) {
            for chunk in chunks {
                let embedding = vectors.next().ok_or_else(|| Error::Ingestion {
                    document: doc.source.clone(),
                    cause: Box::new(Error::InvalidRequest("embedding count does not match chunk count".into())),
                })?;
                records.push(IndexRecord::new(chunk, embedding, doc, base + offset));
            }
        }

        let chunk_count = records.len();
        let batch = if request.recreate_index { WriteBatch::rebuild(records) } else { WriteBatch::supersede(records) };
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.apply(batch))
            .await
            .map_err(|e| Error::index_unavailable(format!("index write task failed: {e}")))??;

        let report = IngestReport {
            documents: documents.len(),
            chunks: chunk_count,
            recreated: request.recreate_index,
            total_documents: self.store.document_count(),
            total_records: self.store.len(),
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
        info!(
            documents = report.documents,
            chunks = report.chunks,
            total_records = report.total_records,
            elapsed_ms = report.elapsed_ms,
            "ingestion finished"
        );
        Ok(report)
    }

    fn check_k(&self, k: usize) -> Result<()> {
        let max_k = self.settings.retrieval.max_k;
        if k == 0 || k > max_k {
            return Err(Error::InvalidRequest(format!("k must be within [1, {max_k}], got {k}")));
        }
        Ok(())
    }

    /// Ranked chunks for `query` without generating an answer.
    pub async fn retrieve(&self, query: &Query, deadline: Deadline) -> Result<RetrievalResult> {
        self.check_k(query.k)?;
        let _querying = self.tracker.begin_query();
        self.retriever.retrieve(query, deadline).await
    }

    pub async fn query(&self, request: &QueryRequest, deadline: Deadline) -> Result<GenerationResponse> {
        let generation = &self.settings.generation;
        if request.message.trim().is_empty() {
            return Err(Error::InvalidRequest("message must not be blank".into()));
        }
        let params = GenerationParams {
            temperature: request.temperature.unwrap_or(generation.temperature),
            max_tokens: request.max_tokens.unwrap_or(generation.max_tokens),
        };
        params.validate(generation.model_max_tokens)?;
        let k = request.k.unwrap_or(self.settings.retrieval.k);
        self.check_k(k)?;
        let generator = self
            .generator
            .as_ref()
            .ok_or_else(|| Error::InvalidConfiguration("no completion service is configured".into()))?;

        let _querying = self.tracker.begin_query();
        let query = Query::new(request.message.clone(), k).with_filter(request.filter.clone());
        let result = self.retriever.retrieve(&query, deadline).await?;
        let context = assemble(&result, generation.context_token_budget);
        if context.is_empty() {
            info!(retrieved = result.len(), "no usable context; answering without generation");
            return Ok(GenerationResponse { answer: NO_CONTEXT_ANSWER.to_string(), sources: Vec::new(), usage: TokenUsage::default() });
        }
        debug!(chunks = context.chunk_ids.len(), tokens = context.token_count, "assembled context");
        let generation_request = GenerationRequest {
            system_prompt: request.system_prompt.clone(),
            context,
            message: request.message.clone(),
            params,
        };
        generator.generate(&generation_request, deadline).await
    }
}
