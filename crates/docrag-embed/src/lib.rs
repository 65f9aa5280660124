//! docrag-embed
//!
//! Embedding adapters. `EmbeddingClient` wraps any `EmbeddingService` with
//! batching, bounded concurrency and retry; `HashEmbeddings` and
//! `AzureOpenAiEmbeddings` are the two services shipped here.
pub mod client;
pub mod hash;
pub mod remote;

pub use client::EmbeddingClient;
pub use hash::HashEmbeddings;
pub use remote::AzureOpenAiEmbeddings;
