use std::sync::Arc;
use tracing::{info, warn};

use docrag_core::credentials::EnvCredential;
use docrag_core::settings::{EmbeddingProvider, RagSettings};
use docrag_core::traits::{EmbeddingService, IndexStore};
use docrag_core::Result;
use docrag_embed::{AzureOpenAiEmbeddings, HashEmbeddings};
use docrag_generate::AzureOpenAiChat;
use docrag_hybrid::LocalIndexStore;

use crate::pipeline::RagPipeline;

/// Builds a pipeline from settings: an on-disk store when `index.directory`
/// is set (in-memory otherwise), the configured embedder, and the chat
/// deployment when an endpoint is configured. A missing API key for a
/// remote service fails here with `InvalidConfiguration`.
pub fn connect(settings: &RagSettings) -> Result<RagPipeline> {
    settings.validate()?;

    let store: Arc<dyn IndexStore> = match settings.index.location() {
        Some(dir) => {
            info!(directory = %dir.display(), "opening index");
            Arc::new(LocalIndexStore::open(&dir)?)
        }
        None => Arc::new(LocalIndexStore::in_memory()?),
    };

    let service = &settings.service;
    let credentials = EnvCredential::new(&service.api_key_env);
    let embedding: Arc<dyn EmbeddingService> = match settings.embedding.provider {
        EmbeddingProvider::Hash => Arc::new(HashEmbeddings::new(settings.embedding.dimension)),
        EmbeddingProvider::Azure => Arc::new(AzureOpenAiEmbeddings::new(
            &service.embedding_deployment(),
            &credentials,
            settings.embedding.dimension,
            service.request_timeout(),
        )?),
    };

    if service.endpoint.trim().is_empty() {
        warn!("no service endpoint configured; answering questions is disabled");
        return RagPipeline::without_generation(store, embedding, settings);
    }
    let chat = AzureOpenAiChat::new(&service.chat_deployment(), &credentials, service.request_timeout())?;
    RagPipeline::new(store, embedding, Arc::new(chat), settings)
}
