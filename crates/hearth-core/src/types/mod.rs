//! Domain types for the hearth discovery and diagnostics core.
//!
//! # Ownership
//!
//! - [`Device`] is owned exclusively by the structural index and mutated
//!   only through its upsert/remove operations.
//! - [`EventRecord`] is immutable after ingestion.
//! - [`EventGap`], [`IssuePattern`] and [`DiagnosticReport`] are derived
//!   values, recomputed per diagnostic run and never persisted.

mod device;
mod document;
mod event;
mod pattern;
mod report;

pub use device::{Capability, Device, DeviceFilter, DeviceId, Platform};
pub use document::{
    AutomationDocument, DocumentKind, DocumentMetadata, RankedDevice, RankedHit,
};
pub use event::{AttributeValue, EventRecord};
pub use pattern::{EventGap, IssueKind, IssuePattern};
pub use report::{DiagnosticReport, ReportSection};
