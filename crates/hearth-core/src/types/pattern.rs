//! Derived anomaly classifications over a device's event history.

use serde::{Deserialize, Serialize};

/// A gap between two consecutive events.
///
/// Computed on demand by the pattern detector; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventGap {
    /// Epoch milliseconds of the event before the gap.
    pub start_ms: i64,
    /// Epoch milliseconds of the event after the gap.
    pub end_ms: i64,
    /// Gap length in milliseconds.
    pub duration_ms: i64,
    /// Whether this gap is long enough to suggest the device dropped off
    /// the network rather than simply being idle.
    pub likely_connectivity_issue: bool,
}

impl EventGap {
    pub fn new(start_ms: i64, end_ms: i64, likely_connectivity_issue: bool) -> Self {
        Self {
            start_ms,
            end_ms,
            duration_ms: end_ms - start_ms,
            likely_connectivity_issue,
        }
    }
}

/// Classification of an issue pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// State flipping faster than a human plausibly operates it;
    /// automation-trigger shape.
    RapidChanges,
    /// Long silences in the event stream suggesting the device went
    /// offline.
    ConnectivityGap,
    /// No anomaly detected.
    Normal,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::RapidChanges => "rapid_changes",
            IssueKind::ConnectivityGap => "connectivity_gap",
            IssueKind::Normal => "normal",
        }
    }
}

/// One classified anomaly with its confidence.
///
/// Confidence values are tunable policy constants, not calibrated
/// probabilities; the constructor clamps them into [0, 1] so the invariant
/// holds regardless of configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuePattern {
    pub kind: IssueKind,
    /// Human-readable summary of what was detected.
    pub description: String,
    /// How many qualifying occurrences were found.
    pub occurrences: usize,
    /// Confidence in [0, 1].
    pub confidence: f32,
    /// Gaps backing a connectivity classification; empty otherwise.
    #[serde(default)]
    pub gaps: Vec<EventGap>,
}

impl IssuePattern {
    pub fn new(
        kind: IssueKind,
        description: impl Into<String>,
        occurrences: usize,
        confidence: f32,
    ) -> Self {
        Self {
            kind,
            description: description.into(),
            occurrences,
            confidence: confidence.clamp(0.0, 1.0),
            gaps: Vec::new(),
        }
    }

    pub fn with_gaps(mut self, gaps: Vec<EventGap>) -> Self {
        self.gaps = gaps;
        self
    }
}
