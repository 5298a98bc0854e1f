//! Diagnostic workflow orchestration.

mod orchestrator;

pub use orchestrator::DiagnosticOrchestrator;
