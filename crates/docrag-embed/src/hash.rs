use async_trait::async_trait;
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use docrag_core::traits::EmbeddingService;
use docrag_core::RemoteError;

pub const DEFAULT_DIM: usize = 1024;

/// Deterministic bag-of-words embedder for offline runs and tests.
///
/// Each lowercase alphanumeric token adds one to the bucket its hash selects;
/// the result is L2-normalized, so texts sharing words get high cosine scores.
#[derive(Debug, Clone)]
pub struct HashEmbeddings {
    dim: usize,
    model: String,
}

impl Default for HashEmbeddings {
    fn default() -> Self {
        Self::new(DEFAULT_DIM)
    }
}

impl HashEmbeddings {
    pub fn new(dim: usize) -> Self {
        let dim = dim.max(1);
        Self { dim, model: format!("hash-{dim}") }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for token in text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let idx = (hasher.finish() % self.dim as u64) as usize;
            v[idx] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

#[async_trait]
impl EmbeddingService for HashEmbeddings {
    fn dim(&self) -> usize {
        self.dim
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RemoteError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shapes_norm_and_determinism() {
        let embedder = HashEmbeddings::new(DEFAULT_DIM);
        let v1 = embedder.embed_text("hello world");
        let v2 = embedder.embed_text("Hello, WORLD!");
        assert_eq!(v1.len(), DEFAULT_DIM);
        let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");
        assert_eq!(v1, v2, "case and punctuation do not matter");
    }

    #[test]
    fn blank_text_embeds_to_zero() {
        let v = HashEmbeddings::new(8).embed_text("  ... ");
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
