//! docrag-vector
//!
//! Exact cosine-similarity search over an immutable, atomically swapped
//! snapshot of index records, optionally backed by a JSON file.
pub mod persist;
pub mod similarity;
pub mod store;

pub use store::{StagedSnapshot, VectorIndex};
