//! Shared plumbing for Azure OpenAI style REST deployments.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::credentials::ApiKey;
use crate::error::{Error, RemoteError, Result};

/// `{endpoint}/openai/deployments/{deployment}/{operation}?api-version={api_version}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzureDeployment {
    pub endpoint: String,
    pub deployment: String,
    pub api_version: String,
}

impl AzureDeployment {
    pub fn new(endpoint: impl Into<String>, deployment: impl Into<String>, api_version: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into(), deployment: deployment.into(), api_version: api_version.into() }
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(Error::InvalidConfiguration("service endpoint is not configured".into()));
        }
        if self.deployment.trim().is_empty() {
            return Err(Error::InvalidConfiguration("deployment name is not configured".into()));
        }
        Ok(())
    }

    pub fn url(&self, operation: &str) -> String {
        format!(
            "{}/openai/deployments/{}/{}?api-version={}",
            self.endpoint.trim_end_matches('/'),
            self.deployment,
            operation,
            self.api_version
        )
    }
}

pub fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::InvalidConfiguration(format!("failed to build HTTP client: {e}")))
}

/// POSTs `body` as JSON with the `api-key` header and decodes the JSON reply.
pub async fn post_json<B, R>(client: &reqwest::Client, url: &str, api_key: &ApiKey, body: &B) -> std::result::Result<R, RemoteError>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let response = client
        .post(url)
        .header("api-key", api_key.expose())
        .json(body)
        .send()
        .await
        .map_err(transport_error)?;

    let status = response.status();
    if !status.is_success() {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = response.text().await.unwrap_or_default();
        return Err(RemoteError::from_status(status.as_u16(), body, retry_after));
    }

    response.json::<R>().await.map_err(|e| {
        if e.is_timeout() {
            RemoteError::Timeout
        } else {
            RemoteError::Malformed(e.to_string())
        }
    })
}

fn transport_error(e: reqwest::Error) -> RemoteError {
    if e.is_timeout() {
        RemoteError::Timeout
    } else {
        RemoteError::Unavailable(e.to_string())
    }
}
