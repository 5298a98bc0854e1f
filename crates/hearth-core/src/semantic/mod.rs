//! Embedding-backed semantic index over devices, automations and event
//! patterns.
//!
//! Answers the queries the structural index cannot: natural-language
//! lookups ranked by embedding similarity, blended with exact capability
//! signals. Never authoritative; [`hydrate`](SemanticIndex::hydrate)
//! delegates back to the structural index for full device records.

mod index;
mod text;

pub use index::{SearchFilter, SearchOutcome, SemanticIndex};
pub use text::{compose_automation_text, compose_device_text, compose_pattern_text};
