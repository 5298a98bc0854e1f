//! Sub-configuration structures for hearth subsystems.
//!
//! Each struct carries serde defaults so partial TOML files and
//! environment overlays only need to name the values they change.

use serde::{Deserialize, Serialize};

use crate::error::{HearthError, HearthResult};

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// tracing filter directive (e.g. "info", "hearth_core=debug").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Embedding backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Expected embedding vector length.
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    /// Batch size for re-indexing sweeps.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_dimension() -> usize {
    384
}

fn default_batch_size() -> usize {
    32
}

/// Structural index configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StructuralConfig {
    /// Minimum normalized edit-distance similarity for a fuzzy name match.
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f32,
}

impl Default for StructuralConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: default_fuzzy_threshold(),
        }
    }
}

fn default_fuzzy_threshold() -> f32 {
    0.6
}

/// How the per-shared-capability boost is combined with cosine similarity.
///
/// Upstream never settled on additive vs multiplicative; additive is the
/// default and the mode is a tunable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BoostMode {
    #[default]
    Additive,
    Multiplicative,
}

/// Semantic index configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SemanticConfig {
    /// Results with cosine similarity below this are discarded.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    /// Default result cap when the caller does not specify k.
    #[serde(default = "default_k")]
    pub default_k: usize,
    /// Boost applied per capability shared between query and document.
    #[serde(default = "default_capability_boost")]
    pub capability_boost: f32,
    #[serde(default)]
    pub boost_mode: BoostMode,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            default_k: default_k(),
            capability_boost: default_capability_boost(),
            boost_mode: BoostMode::default(),
        }
    }
}

fn default_similarity_threshold() -> f32 {
    0.5
}

fn default_k() -> usize {
    10
}

fn default_capability_boost() -> f32 {
    0.1
}

/// Synchronization scheduler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyncConfig {
    /// Deferred-mutation flush interval in seconds.
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
    /// Pending-queue size that triggers an early flush.
    #[serde(default = "default_flush_threshold")]
    pub flush_threshold: usize,
    /// Full event-pattern rebuild sweep interval in seconds.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Capacity of the bounded queue between the device source and the
    /// structural index ingest task.
    #[serde(default = "default_ingest_queue_capacity")]
    pub ingest_queue_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            flush_interval_secs: default_flush_interval_secs(),
            flush_threshold: default_flush_threshold(),
            sweep_interval_secs: default_sweep_interval_secs(),
            ingest_queue_capacity: default_ingest_queue_capacity(),
        }
    }
}

fn default_flush_interval_secs() -> u64 {
    300
}

fn default_flush_threshold() -> usize {
    25
}

fn default_sweep_interval_secs() -> u64 {
    86_400
}

fn default_ingest_queue_capacity() -> usize {
    256
}

/// Pattern detector policy constants.
///
/// These confidence values are fixed policy defaults, not a calibrated
/// statistical model. Re-validate per deployment before trusting them as
/// probabilities.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PatternConfig {
    /// Gaps below this are automation-trigger shaped (confidence
    /// interpolated between `rapid_confidence_floor` and
    /// `rapid_confidence_ceiling`).
    #[serde(default = "default_rapid_fast_ms")]
    pub rapid_fast_ms: i64,
    /// Gaps in [fast, medium] score `rapid_confidence_floor`.
    #[serde(default = "default_rapid_medium_ms")]
    pub rapid_medium_ms: i64,
    /// Gaps in (medium, slow] score `rapid_confidence_slow`.
    #[serde(default = "default_rapid_slow_ms")]
    pub rapid_slow_ms: i64,
    #[serde(default = "default_rapid_ceiling")]
    pub rapid_confidence_ceiling: f32,
    #[serde(default = "default_rapid_floor")]
    pub rapid_confidence_floor: f32,
    #[serde(default = "default_rapid_slow_confidence")]
    pub rapid_confidence_slow: f32,
    /// Inter-event gap that flags a likely connectivity issue.
    #[serde(default = "default_connectivity_gap_ms")]
    pub connectivity_gap_ms: i64,
    /// Intentionally lower than automation-trigger confidence: long gaps
    /// may be deliberate (vacation mode, rarely-used devices).
    #[serde(default = "default_connectivity_confidence")]
    pub connectivity_confidence: f32,
    #[serde(default = "default_normal_confidence")]
    pub normal_confidence: f32,
    /// Off-peak window (hours, UTC) in which unattended automations most
    /// commonly fire; immediate off→on re-triggers in it get a boost.
    #[serde(default = "default_off_peak_start_hour")]
    pub off_peak_start_hour: u32,
    #[serde(default = "default_off_peak_end_hour")]
    pub off_peak_end_hour: u32,
    #[serde(default = "default_off_peak_boost")]
    pub off_peak_boost: f32,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            rapid_fast_ms: default_rapid_fast_ms(),
            rapid_medium_ms: default_rapid_medium_ms(),
            rapid_slow_ms: default_rapid_slow_ms(),
            rapid_confidence_ceiling: default_rapid_ceiling(),
            rapid_confidence_floor: default_rapid_floor(),
            rapid_confidence_slow: default_rapid_slow_confidence(),
            connectivity_gap_ms: default_connectivity_gap_ms(),
            connectivity_confidence: default_connectivity_confidence(),
            normal_confidence: default_normal_confidence(),
            off_peak_start_hour: default_off_peak_start_hour(),
            off_peak_end_hour: default_off_peak_end_hour(),
            off_peak_boost: default_off_peak_boost(),
        }
    }
}

impl PatternConfig {
    /// Check internal consistency of the policy constants.
    pub fn validate(&self) -> HearthResult<()> {
        if !(0 < self.rapid_fast_ms
            && self.rapid_fast_ms <= self.rapid_medium_ms
            && self.rapid_medium_ms <= self.rapid_slow_ms)
        {
            return Err(HearthError::ConfigError(
                "patterns: rapid gap bands must satisfy 0 < fast <= medium <= slow".into(),
            ));
        }
        if self.connectivity_gap_ms <= 0 {
            return Err(HearthError::ConfigError(
                "patterns.connectivity_gap_ms must be positive".into(),
            ));
        }
        for (name, value) in [
            ("rapid_confidence_ceiling", self.rapid_confidence_ceiling),
            ("rapid_confidence_floor", self.rapid_confidence_floor),
            ("rapid_confidence_slow", self.rapid_confidence_slow),
            ("connectivity_confidence", self.connectivity_confidence),
            ("normal_confidence", self.normal_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(HearthError::ConfigError(format!(
                    "patterns.{name} must be within [0, 1]"
                )));
            }
        }
        if self.off_peak_start_hour > 23 || self.off_peak_end_hour > 23 {
            return Err(HearthError::ConfigError(
                "patterns: off-peak hours must be within 0..=23".into(),
            ));
        }
        Ok(())
    }
}

fn default_rapid_fast_ms() -> i64 {
    3_000
}

fn default_rapid_medium_ms() -> i64 {
    5_000
}

fn default_rapid_slow_ms() -> i64 {
    10_000
}

fn default_rapid_ceiling() -> f32 {
    0.99
}

fn default_rapid_floor() -> f32 {
    0.95
}

fn default_rapid_slow_confidence() -> f32 {
    0.85
}

fn default_connectivity_gap_ms() -> i64 {
    3_600_000
}

fn default_connectivity_confidence() -> f32 {
    0.80
}

fn default_normal_confidence() -> f32 {
    0.95
}

fn default_off_peak_start_hour() -> u32 {
    1
}

fn default_off_peak_end_hour() -> u32 {
    5
}

fn default_off_peak_boost() -> f32 {
    0.02
}

/// Diagnostic orchestrator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiagnosticsConfig {
    /// Per-sub-call timeout in milliseconds. A timed-out sub-call is a
    /// soft failure reflected in the report, not an orchestrator error.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
    /// Event lookback window for pattern analysis, in hours. Bounded by
    /// the upstream retention window (typically 7 days).
    #[serde(default = "default_event_window_hours")]
    pub event_window_hours: u64,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: default_call_timeout_ms(),
            event_window_hours: default_event_window_hours(),
        }
    }
}

fn default_call_timeout_ms() -> u64 {
    2_000
}

fn default_event_window_hours() -> u64 {
    168
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_defaults_valid() {
        assert!(PatternConfig::default().validate().is_ok());
    }

    #[test]
    fn test_pattern_band_ordering_enforced() {
        let mut config = PatternConfig::default();
        config.rapid_medium_ms = 1_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pattern_confidence_range_enforced() {
        let mut config = PatternConfig::default();
        config.connectivity_confidence = 1.2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_boost_mode_default() {
        assert_eq!(BoostMode::default(), BoostMode::Additive);
    }
}
