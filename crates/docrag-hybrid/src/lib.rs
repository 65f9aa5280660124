//! docrag-hybrid
//!
//! The index store that keeps the keyword and vector sides in step, the
//! retriever that fuses their rankings, and the context assembler.
pub mod assemble;
pub mod retriever;
pub mod store;

pub use assemble::assemble;
pub use retriever::{fuse, Retriever};
pub use store::{HybridIndexStore, LocalIndexStore};
