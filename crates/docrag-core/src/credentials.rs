//! Credential seam. Remote adapters fetch their key once, when they are
//! built, and never write it anywhere.

use std::fmt;

use crate::error::{Error, Result};

#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

pub trait CredentialProvider: Send + Sync {
    fn api_key(&self) -> Result<ApiKey>;
}

#[derive(Debug, Clone)]
pub struct StaticCredential(ApiKey);

impl StaticCredential {
    pub fn new(key: impl Into<String>) -> Self {
        Self(ApiKey::new(key))
    }
}

impl CredentialProvider for StaticCredential {
    fn api_key(&self) -> Result<ApiKey> {
        if self.0.expose().trim().is_empty() {
            return Err(Error::InvalidConfiguration("API key is empty".into()));
        }
        Ok(self.0.clone())
    }
}

/// Reads the key from an environment variable, e.g. one populated by a
/// vault agent.
#[derive(Debug, Clone)]
pub struct EnvCredential {
    var: String,
}

impl EnvCredential {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl CredentialProvider for EnvCredential {
    fn api_key(&self) -> Result<ApiKey> {
        match std::env::var(&self.var) {
            Ok(v) if !v.trim().is_empty() => Ok(ApiKey::new(v.trim())),
            _ => Err(Error::InvalidConfiguration(format!("environment variable {} is not set", self.var))),
        }
    }
}
