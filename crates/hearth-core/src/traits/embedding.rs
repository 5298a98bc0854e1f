//! Embedding backend seam.

use async_trait::async_trait;

use crate::error::HearthResult;

/// Text → fixed-length vector backend.
///
/// Embedding calls are potentially slow (network or model inference) and
/// are therefore only issued from the sync scheduler's background flush
/// worker or an explicit index call, never implicitly from a
/// request-serving read path.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text.
    ///
    /// # Errors
    ///
    /// `BackendUnavailable` when the backend is unreachable; callers on
    /// the search path convert this into a degraded result instead of
    /// propagating it.
    async fn embed(&self, text: &str) -> HearthResult<Vec<f32>>;

    /// Embed a batch of texts in one backend round trip.
    ///
    /// Must return exactly one vector per input, in input order. Required
    /// for efficient re-indexing sweeps.
    async fn embed_batch(&self, texts: &[String]) -> HearthResult<Vec<Vec<f32>>>;

    /// Fixed output vector length.
    fn dimensions(&self) -> usize;

    /// Identifier of the underlying model, for logging.
    fn model_id(&self) -> &str;

    /// Whether the backend is currently usable.
    fn is_ready(&self) -> bool {
        true
    }
}
