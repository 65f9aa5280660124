use futures::{stream, StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::{debug, info};

use docrag_core::retry::{self, Deadline, RetryPolicy};
use docrag_core::settings::EmbeddingSettings;
use docrag_core::traits::EmbeddingService;
use docrag_core::{Error, RemoteError, Result};

const OPERATION: &str = "embedding";

/// Embeds texts through a remote service: splits input into batches, keeps at
/// most `max_in_flight` batches outstanding, retries transient failures and
/// checks that every vector has the service's dimension.
#[derive(Clone)]
pub struct EmbeddingClient {
    service: Arc<dyn EmbeddingService>,
    batch_size: usize,
    max_in_flight: usize,
    retry: RetryPolicy,
}

impl EmbeddingClient {
    pub fn new(service: Arc<dyn EmbeddingService>) -> Self {
        Self::from_settings(service, &EmbeddingSettings::default())
    }

    pub fn from_settings(service: Arc<dyn EmbeddingService>, settings: &EmbeddingSettings) -> Self {
        Self {
            service,
            batch_size: settings.batch_size.max(1),
            max_in_flight: settings.max_in_flight.max(1),
            retry: settings.retry,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn dim(&self) -> usize {
        self.service.dim()
    }

    pub fn model_name(&self) -> &str {
        self.service.model_name()
    }

    /// One vector per input text, in input order. Empty input makes no call.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embed_with_deadline(texts, Deadline::none()).await
    }

    pub async fn embed_with_deadline(&self, texts: &[String], deadline: Deadline) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let batches = texts.len().div_ceil(self.batch_size);
        info!(texts = texts.len(), batches, model = self.model_name(), "embedding texts");
        let per_batch: Vec<Vec<Vec<f32>>> = stream::iter(texts.chunks(self.batch_size).enumerate())
            .map(|(index, batch)| self.embed_one(index, batch, deadline))
            .buffered(self.max_in_flight)
            .boxed()
            .try_collect()
            .await?;
        Ok(per_batch.into_iter().flatten().collect())
    }

    pub async fn embed_query(&self, text: &str, deadline: Deadline) -> Result<Vec<f32>> {
        let mut vectors = self.embed_with_deadline(&[text.to_string()], deadline).await?;
        vectors.pop().ok_or_else(|| Error::EmbeddingService {
            attempts: 1,
            cause: RemoteError::Malformed("no vector returned for query".into()),
        })
    }

    async fn embed_one(&self, index: usize, batch: &[String], deadline: Deadline) -> Result<Vec<Vec<f32>>> {
        let service = &self.service;
        let vectors = retry::run(&self.retry, deadline, OPERATION, |attempt| async move {
            debug!(batch = index, attempt, size = batch.len(), "embedding batch");
            let vectors = service.embed_batch(batch).await?;
            if vectors.len() != batch.len() {
                return Err(RemoteError::Malformed(format!("expected {} vectors, got {}", batch.len(), vectors.len())));
            }
            Ok(vectors)
        })
        .await
        .map_err(|e| e.into_error(OPERATION, |attempts, cause| Error::EmbeddingService { attempts, cause }))?;

        let expected = self.service.dim();
        if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
            return Err(Error::DimensionMismatch { expected, actual: bad.len() });
        }
        Ok(vectors)
    }
}
