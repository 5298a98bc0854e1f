//! Trait seams for external collaborators.
//!
//! The core consumes device snapshots, event streams and an embedding
//! backend through these traits; it never talks to physical devices or
//! cloud platforms itself.
//!
//! # Traits
//!
//! - [`DeviceSource`]: supplies device snapshots; incremental mutations
//!   arrive through an explicit bounded channel of [`DeviceMutation`]
//! - [`EventSource`]: supplies time-ordered event records per device
//! - [`EmbeddingProvider`]: text → fixed-length vector, with batch support

mod device_source;
mod embedding;
mod event_source;

pub use device_source::{DeviceMutation, DeviceSource};
pub use embedding::EmbeddingProvider;
pub use event_source::EventSource;
