//! Batch-size enforcement wrapper.

use async_trait::async_trait;
use tracing::debug;

use hearth_core::error::HearthResult;
use hearth_core::traits::EmbeddingProvider;

/// Wraps a provider whose backend caps the number of texts per request.
///
/// `embed_batch` is split into chunks of at most `batch_size` and issued
/// sequentially; output order matches input order. Chunks are not retried
/// independently; a failing chunk fails the whole batch, matching the
/// all-or-nothing contract of the underlying trait.
pub struct BatchingProvider<P> {
    inner: P,
    batch_size: usize,
}

impl<P: EmbeddingProvider> BatchingProvider<P> {
    pub fn new(inner: P, batch_size: usize) -> Self {
        Self {
            inner,
            batch_size: batch_size.max(1),
        }
    }
}

#[async_trait]
impl<P: EmbeddingProvider> EmbeddingProvider for BatchingProvider<P> {
    async fn embed(&self, text: &str) -> HearthResult<Vec<f32>> {
        self.inner.embed(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> HearthResult<Vec<Vec<f32>>> {
        if texts.len() <= self.batch_size {
            return self.inner.embed_batch(texts).await;
        }
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            out.extend(self.inner.embed_batch(chunk).await?);
        }
        debug!(
            texts = texts.len(),
            chunks = texts.len().div_ceil(self.batch_size),
            "split oversized embedding batch"
        );
        Ok(out)
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    fn is_ready(&self) -> bool {
        self.inner.is_ready()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct ChunkCounter {
        calls: Arc<AtomicUsize>,
        max_seen: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EmbeddingProvider for ChunkCounter {
        async fn embed(&self, _text: &str) -> HearthResult<Vec<f32>> {
            Ok(vec![1.0])
        }

        async fn embed_batch(&self, texts: &[String]) -> HearthResult<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.max_seen.fetch_max(texts.len(), Ordering::SeqCst);
            Ok(texts.iter().map(|_| vec![1.0]).collect())
        }

        fn dimensions(&self) -> usize {
            1
        }

        fn model_id(&self) -> &str {
            "chunk-counter"
        }
    }

    #[tokio::test]
    async fn test_splits_oversized_batches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let provider = BatchingProvider::new(
            ChunkCounter {
                calls: calls.clone(),
                max_seen: max_seen.clone(),
            },
            4,
        );

        let texts: Vec<String> = (0..10).map(|i| format!("text {i}")).collect();
        let out = provider.embed_batch(&texts).await.unwrap();

        assert_eq!(out.len(), 10);
        assert_eq!(calls.load(Ordering::SeqCst), 3, "10 texts at size 4 = 3 chunks");
        assert!(max_seen.load(Ordering::SeqCst) <= 4);
    }

    #[tokio::test]
    async fn test_small_batch_passes_through() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = BatchingProvider::new(
            ChunkCounter {
                calls: calls.clone(),
                max_seen: Arc::new(AtomicUsize::new(0)),
            },
            32,
        );
        provider
            .embed_batch(&["one".to_string(), "two".to_string()])
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
