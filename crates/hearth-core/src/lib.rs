//! Device discovery and diagnostic reasoning for a multi-platform smart
//! home.
//!
//! Two complementary indexes over one device population:
//!
//! - [`index::StructuralIndex`]: exact and fuzzy lookup by name, alias,
//!   room, platform and capability, with atomic multi-map updates
//! - [`semantic::SemanticIndex`]: embedding-based similarity search over
//!   device, automation and event-pattern documents
//!
//! A [`sync::SyncScheduler`] keeps the semantic index eventually
//! consistent with the structural one, [`patterns`] derives issue
//! hypotheses from raw event streams, and the
//! [`diagnostics::DiagnosticOrchestrator`] assembles it all into
//! best-effort diagnostic reports. [`engine::DiscoveryEngine`] is the
//! composition root that wires these together behind one facade.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use hearth_core::config::Config;
//! use hearth_core::engine::DiscoveryEngine;
//! use hearth_core::stubs::{StaticDeviceSource, StaticEventSource};
//! # use hearth_core::traits::EmbeddingProvider;
//! # fn provider() -> Arc<dyn EmbeddingProvider> { unimplemented!() }
//!
//! # async fn run() -> hearth_core::error::HearthResult<()> {
//! let engine = DiscoveryEngine::new(
//!     Config::load()?,
//!     provider(),
//!     vec![Arc::new(StaticDeviceSource::default())],
//!     Arc::new(StaticEventSource::default()),
//! );
//! engine.start().await?;
//! let report = engine.diagnose("hall lamp", "keeps turning itself on").await?;
//! println!("{} recommendations", report.recommendations.len());
//! engine.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod index;
pub mod patterns;
pub mod semantic;
pub mod stubs;
pub mod sync;
pub mod traits;
pub mod types;

pub use config::Config;
pub use engine::{DeviceSearchResult, DiscoveryEngine, DiscoverySummary};
pub use error::{HearthError, HearthResult};
pub use types::{
    AttributeValue, AutomationDocument, Capability, Device, DeviceFilter, DeviceId,
    DiagnosticReport, EventRecord, IssueKind, IssuePattern, Platform, ReportSection,
};
