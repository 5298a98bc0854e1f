//! Diagnostic report assembly types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{AutomationDocument, Device, IssuePattern, RankedHit};

/// One section of a diagnostic report.
///
/// A failure or timeout in one data source degrades only its section;
/// unavailable sections are explicitly marked, never silently dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReportSection<T> {
    /// The data source answered within its deadline.
    Populated { data: T },
    /// The data source failed; the reason is carried for the caller.
    Degraded { reason: String },
    /// The data source exceeded the per-call timeout.
    TimedOut,
}

impl<T> ReportSection<T> {
    pub fn is_populated(&self) -> bool {
        matches!(self, ReportSection::Populated { .. })
    }

    pub fn as_populated(&self) -> Option<&T> {
        match self {
            ReportSection::Populated { data } => Some(data),
            _ => None,
        }
    }
}

/// Best-effort diagnostic report for one device and issue description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub report_id: Uuid,
    /// The resolved device under diagnosis.
    pub device: Device,
    /// Free-text issue description as supplied by the caller.
    pub issue: String,
    /// Classified anomalies from the device's recent event history.
    pub patterns: ReportSection<Vec<IssuePattern>>,
    /// Automations that reference or resemble this device.
    pub related_automations: ReportSection<Vec<AutomationDocument>>,
    /// Semantically similar past issue patterns across the home.
    pub similar_issues: ReportSection<Vec<RankedHit>>,
    /// Rule-based next steps composed from the detected patterns.
    pub recommendations: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_accessors() {
        let populated: ReportSection<Vec<u32>> = ReportSection::Populated { data: vec![1] };
        assert!(populated.is_populated());
        assert_eq!(populated.as_populated(), Some(&vec![1]));

        let degraded: ReportSection<Vec<u32>> = ReportSection::Degraded {
            reason: "backend offline".into(),
        };
        assert!(!degraded.is_populated());
        assert!(degraded.as_populated().is_none());

        let timed_out: ReportSection<Vec<u32>> = ReportSection::TimedOut;
        assert!(timed_out.as_populated().is_none());
    }
}
