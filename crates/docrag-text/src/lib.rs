pub mod index;
pub mod tantivy_utils;

pub use index::TantivyKeywordIndex;
