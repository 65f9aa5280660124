//! Typed settings for the whole pipeline, read from the `[rag]` table.
//!
//! Every field has a default so partial configuration files work.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::chunker::ChunkingConfig;
use crate::config::expand_path;
use crate::error::{Error, Result};
use crate::http::AzureDeployment;
use crate::prompt::SystemPromptSource;
use crate::retry::RetryPolicy;
use crate::types::{FusionWeights, GenerationParams};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    pub service: ServiceSettings,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingSettings,
    pub retrieval: RetrievalSettings,
    pub generation: GenerationSettings,
    pub index: IndexSettings,
}

impl RagSettings {
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        self.embedding.validate()?;
        self.retrieval.weights().normalized()?;
        if self.retrieval.k == 0 || self.retrieval.k > self.retrieval.max_k {
            return Err(Error::InvalidConfiguration(format!(
                "retrieval.k must be within [1, {}], got {}",
                self.retrieval.max_k, self.retrieval.k
            )));
        }
        self.generation
            .default_params()
            .validate(self.generation.model_max_tokens)
            .map_err(|e| Error::InvalidConfiguration(format!("generation defaults: {e}")))?;
        if self.generation.context_token_budget == 0 {
            return Err(Error::InvalidConfiguration("generation.context_token_budget must be positive".into()));
        }
        Ok(())
    }
}

/// Where the embedding and chat deployments live and how to authenticate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    pub endpoint: String,
    pub api_version: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub embedding_deployment: String,
    pub chat_deployment: String,
    pub request_timeout_secs: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_version: "2023-05-15".into(),
            api_key_env: "AZURE_OPENAI_API_KEY".into(),
            embedding_deployment: "text-embedding-ada-002".into(),
            chat_deployment: "gpt-35-turbo".into(),
            request_timeout_secs: 60,
        }
    }
}

impl ServiceSettings {
    pub fn embedding_deployment(&self) -> AzureDeployment {
        AzureDeployment::new(&self.endpoint, &self.embedding_deployment, &self.api_version)
    }

    pub fn chat_deployment(&self) -> AzureDeployment {
        AzureDeployment::new(&self.endpoint, &self.chat_deployment, &self.api_version)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Remote Azure OpenAI embeddings deployment.
    Azure,
    /// Local feature-hashing embedder; no network.
    Hash,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProvider,
    pub dimension: usize,
    pub batch_size: usize,
    pub max_in_flight: usize,
    pub retry: RetryPolicy,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { provider: EmbeddingProvider::Azure, dimension: 1536, batch_size: 16, max_in_flight: 4, retry: RetryPolicy::default() }
    }
}

impl EmbeddingSettings {
    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 || self.batch_size == 0 || self.max_in_flight == 0 {
            return Err(Error::InvalidConfiguration(
                "embedding.dimension, embedding.batch_size and embedding.max_in_flight must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub k: usize,
    pub max_k: usize,
    pub semantic_weight: f32,
    pub lexical_weight: f32,
    /// Each engine is asked for `k * candidate_multiplier` candidates before fusion.
    pub candidate_multiplier: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { k: 5, max_k: 50, semantic_weight: 0.5, lexical_weight: 0.5, candidate_multiplier: 3 }
    }
}

impl RetrievalSettings {
    pub fn weights(&self) -> FusionWeights {
        FusionWeights::new(self.semantic_weight, self.lexical_weight)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub max_tokens: u32,
    pub temperature: f32,
    pub model_max_tokens: u32,
    pub context_token_budget: usize,
    pub system_prompt: SystemPromptSource,
    pub retry: RetryPolicy,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_tokens: 500,
            temperature: 0.7,
            model_max_tokens: 4000,
            context_token_budget: 3000,
            system_prompt: SystemPromptSource::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl GenerationSettings {
    pub fn default_params(&self) -> GenerationParams {
        GenerationParams { temperature: self.temperature, max_tokens: self.max_tokens }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    /// On-disk index location; in-memory when unset.
    pub directory: Option<String>,
}

impl IndexSettings {
    pub fn location(&self) -> Option<PathBuf> {
        self.directory.as_deref().filter(|d| !d.trim().is_empty()).map(expand_path)
    }
}
