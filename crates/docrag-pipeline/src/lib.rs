//! docrag-pipeline
//!
//! `RagPipeline` ties loading, chunking, embedding, the index store,
//! retrieval and generation together; `connect` builds one from settings.
pub mod connect;
pub mod pipeline;
pub mod request;
pub mod state;

pub use connect::connect;
pub use pipeline::{RagPipeline, NO_CONTEXT_ANSWER};
pub use request::{IngestReport, IngestRequest, QueryRequest};
pub use state::PipelineState;
