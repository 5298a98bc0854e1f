//! In-memory stub implementations of the external collaborator traits.
//!
//! Used by tests and scaffolding; production composition injects real
//! platform adapters instead.

mod device_source_stub;
mod event_source_stub;

pub use device_source_stub::StaticDeviceSource;
pub use event_source_stub::StaticEventSource;
