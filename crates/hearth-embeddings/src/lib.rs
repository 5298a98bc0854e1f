//! Embedding providers for the hearth core.
//!
//! - [`HashEmbeddingProvider`]: deterministic, dependency-free vectors for
//!   development and tests
//! - [`BatchingProvider`]: splits oversized batches before they reach a
//!   backend with a request-size limit
//! - [`OfflineProvider`]: always-failing stand-in for exercising degraded
//!   paths

mod batching;
mod hash_provider;
mod offline;

pub use batching::BatchingProvider;
pub use hash_provider::HashEmbeddingProvider;
pub use offline::OfflineProvider;
