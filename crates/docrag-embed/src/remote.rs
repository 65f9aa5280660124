use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use docrag_core::credentials::{ApiKey, CredentialProvider};
use docrag_core::http::{build_client, post_json, AzureDeployment};
use docrag_core::traits::EmbeddingService;
use docrag_core::{RemoteError, Result};

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

/// Azure OpenAI `embeddings` deployment.
pub struct AzureOpenAiEmbeddings {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: ApiKey,
    dim: usize,
}

impl AzureOpenAiEmbeddings {
    /// Fails with `InvalidConfiguration` when the deployment is incomplete or
    /// no API key is available.
    pub fn new(deployment: &AzureDeployment, credentials: &dyn CredentialProvider, dim: usize, timeout: Duration) -> Result<Self> {
        deployment.validate()?;
        let api_key = credentials.api_key()?;
        Ok(Self {
            client: build_client(timeout)?,
            url: deployment.url("embeddings"),
            model: deployment.deployment.clone(),
            api_key,
            dim,
        })
    }
}

#[async_trait]
impl EmbeddingService for AzureOpenAiEmbeddings {
    fn dim(&self) -> usize {
        self.dim
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed_batch(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, RemoteError> {
        let response: EmbeddingsResponse = post_json(&self.client, &self.url, &self.api_key, &EmbeddingsRequest { input: texts }).await?;
        let mut items = response.data;
        if items.iter().all(|i| i.index.is_some()) {
            items.sort_by_key(|i| i.index);
        }
        Ok(items.into_iter().map(|i| i.embedding).collect())
    }
}
