//! Deterministic hash-based embedding stub.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;

use hearth_core::error::{HearthError, HearthResult};
use hearth_core::traits::EmbeddingProvider;

const DEFAULT_DIMENSION: usize = 384;

/// Deterministic embedding provider with no model dependency.
///
/// Each whitespace token is hashed and the hash is expanded into a
/// pseudo-random contribution per dimension; contributions are summed and
/// the result unit-normalized. The same text always maps to the same
/// vector, and texts sharing tokens land closer than unrelated ones,
/// which is enough signal for development and deterministic tests. Not a
/// semantic model: do not ship search quality expectations against it.
#[derive(Debug, Clone)]
pub struct HashEmbeddingProvider {
    dimension: usize,
}

impl HashEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_text(&self, text: &str) -> HearthResult<Vec<f32>> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        if tokens.is_empty() {
            return Err(HearthError::InvalidRange {
                field: "text".to_string(),
                message: "cannot embed empty text".to_string(),
            });
        }

        let mut vector = vec![0.0f32; self.dimension];
        for token in tokens {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            let mut state = hasher.finish();
            for slot in vector.iter_mut() {
                // Knuth's MMIX constants; spreads one token hash across
                // every dimension.
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                let unit = (state >> 11) as f32 / (1u64 << 53) as f32;
                *slot += unit * 2.0 - 1.0;
            }
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in vector.iter_mut() {
                *x /= norm;
            }
        }
        Ok(vector)
    }
}

impl Default for HashEmbeddingProvider {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    async fn embed(&self, text: &str) -> HearthResult<Vec<f32>> {
        self.embed_text(text)
    }

    async fn embed_batch(&self, texts: &[String]) -> HearthResult<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed_text(t)).collect()
    }

    fn dimensions(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        "hash-stub"
    }
}
