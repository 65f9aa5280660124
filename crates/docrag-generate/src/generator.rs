use std::sync::Arc;
use tracing::{debug, info};

use docrag_core::prompt::{normalize_prompt, DEFAULT_SYSTEM_PROMPT};
use docrag_core::retry::{self, Deadline, RetryPolicy};
use docrag_core::settings::GenerationSettings;
use docrag_core::traits::CompletionService;
use docrag_core::types::{ChatMessage, CompletionPrompt, GenerationRequest, GenerationResponse};
use docrag_core::{Error, RemoteError, Result};

const OPERATION: &str = "generation";

pub fn user_message(context: &str, message: &str) -> String {
    format!("Context:\n{context}\n\nQuestion: {message}\n\nPlease answer the question based on the provided context.")
}

#[derive(Clone)]
pub struct Generator {
    service: Arc<dyn CompletionService>,
    retry: RetryPolicy,
    model_max_tokens: u32,
    system_prompt: Option<String>,
}

impl Generator {
    pub fn new(service: Arc<dyn CompletionService>) -> Self {
        Self::from_settings(service, &GenerationSettings::default())
    }

    /// Resolves the configured system prompt once, up front.
    pub fn from_settings(service: Arc<dyn CompletionService>, settings: &GenerationSettings) -> Self {
        Self {
            service,
            retry: settings.retry,
            model_max_tokens: settings.model_max_tokens,
            system_prompt: settings.system_prompt.resolve(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl AsRef<str>) -> Self {
        self.system_prompt = Some(normalize_prompt(prompt.as_ref())).filter(|p| !p.is_empty());
        self
    }

    pub fn model_max_tokens(&self) -> u32 {
        self.model_max_tokens
    }

    pub fn validate(&self, request: &GenerationRequest) -> Result<()> {
        if request.message.trim().is_empty() {
            return Err(Error::InvalidRequest("message must not be blank".into()));
        }
        request.params.validate(self.model_max_tokens)
    }

    /// System prompt: request override, then configured default, then built-in.
    pub fn compose(&self, request: &GenerationRequest) -> CompletionPrompt {
        let system = request
            .system_prompt
            .as_deref()
            .map(normalize_prompt)
            .filter(|p| !p.is_empty())
            .or_else(|| self.system_prompt.clone())
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());
        CompletionPrompt {
            messages: vec![ChatMessage::system(system), ChatMessage::user(user_message(&request.context.text, &request.message))],
            params: request.params,
        }
    }

    pub async fn generate(&self, request: &GenerationRequest, deadline: Deadline) -> Result<GenerationResponse> {
        self.validate(request)?;
        let prompt = self.compose(request);
        let service = &self.service;
        let prompt_ref = &prompt;
        debug!(model = service.model_name(), context_tokens = request.context.token_count, "requesting completion");
        let completion = retry::run(&self.retry, deadline, OPERATION, |attempt| async move {
            debug!(attempt, "completion attempt");
            let completion = service.complete(prompt_ref).await?;
            if completion.text.trim().is_empty() {
                return Err(RemoteError::Malformed("empty completion".into()));
            }
            Ok(completion)
        })
        .await
        .map_err(|e| e.into_error(OPERATION, |attempts, cause| Error::GenerationService { attempts, cause }))?;

        info!(
            prompt_tokens = completion.usage.prompt_tokens,
            completion_tokens = completion.usage.completion_tokens,
            sources = request.context.sources.len(),
            "generated answer"
        );
        Ok(GenerationResponse {
            answer: completion.text.trim().to_string(),
            sources: request.context.sources.clone(),
            usage: completion.usage,
        })
    }
}
