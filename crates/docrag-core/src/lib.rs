//! docrag-core
//!
//! Shared vocabulary for the docrag workspace: domain types, the error
//! taxonomy, engine and service traits, chunking, configuration and the
//! retry/deadline primitives used by every remote adapter.

pub mod chunker;
pub mod config;
pub mod credentials;
pub mod error;
pub mod http;
pub mod loader;
pub mod prompt;
pub mod retry;
pub mod settings;
pub mod tokens;
pub mod traits;
pub mod types;

pub use error::{Error, RemoteError, Result};
