//! docrag-generate
//!
//! Grounded answer generation: request validation, prompt composition and
//! retrying delegation to a chat completion service.
pub mod generator;
pub mod remote;

pub use generator::{user_message, Generator};
pub use remote::AzureOpenAiChat;
