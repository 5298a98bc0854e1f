//! Always-unavailable provider for degraded-path testing.

use async_trait::async_trait;

use hearth_core::error::{HearthError, HearthResult};
use hearth_core::traits::EmbeddingProvider;

/// Provider that reports unavailable on every call.
///
/// Stands in for a down embedding backend so degraded search and
/// flush-retry behavior can be exercised deterministically.
#[derive(Debug, Default, Clone)]
pub struct OfflineProvider {
    dimension: usize,
}

impl OfflineProvider {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingProvider for OfflineProvider {
    async fn embed(&self, _text: &str) -> HearthResult<Vec<f32>> {
        Err(HearthError::BackendUnavailable(
            "embedding backend offline".to_string(),
        ))
    }

    async fn embed_batch(&self, _texts: &[String]) -> HearthResult<Vec<Vec<f32>>> {
        Err(HearthError::BackendUnavailable(
            "embedding backend offline".to_string(),
        ))
    }

    fn dimensions(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        "offline"
    }

    fn is_ready(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_always_unavailable() {
        let provider = OfflineProvider::new(8);
        assert!(!provider.is_ready());
        assert!(matches!(
            provider.embed("anything").await,
            Err(HearthError::BackendUnavailable(_))
        ));
    }
}
