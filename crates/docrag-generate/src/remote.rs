use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use docrag_core::credentials::{ApiKey, CredentialProvider};
use docrag_core::http::{build_client, post_json, AzureDeployment};
use docrag_core::traits::CompletionService;
use docrag_core::types::{ChatMessage, Completion, CompletionPrompt, TokenUsage};
use docrag_core::{RemoteError, Result};

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Azure OpenAI `chat/completions` deployment.
pub struct AzureOpenAiChat {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: ApiKey,
}

impl AzureOpenAiChat {
    pub fn new(deployment: &AzureDeployment, credentials: &dyn CredentialProvider, timeout: Duration) -> Result<Self> {
        deployment.validate()?;
        let api_key = credentials.api_key()?;
        Ok(Self {
            client: build_client(timeout)?,
            url: deployment.url("chat/completions"),
            model: deployment.deployment.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl CompletionService for AzureOpenAiChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &CompletionPrompt) -> std::result::Result<Completion, RemoteError> {
        let body = ChatRequest {
            messages: &prompt.messages,
            max_tokens: prompt.params.max_tokens,
            temperature: prompt.params.temperature,
        };
        let response: ChatResponse = post_json(&self.client, &self.url, &self.api_key, &body).await?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| RemoteError::Malformed("response has no choices".into()))?;
        Ok(Completion { text: choice.message.content.unwrap_or_default(), usage: response.usage.unwrap_or_default() })
    }
}
