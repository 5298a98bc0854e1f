//! Error types for hearth-core.
//!
//! This module defines the central error type [`HearthError`] used throughout
//! the hearth-core crate, along with the [`HearthResult<T>`] type alias.
//!
//! Absence is data, not control flow: lookups return
//! `HearthError::DeviceNotFound` as a typed result the caller is expected to
//! match on, and the semantic search path converts backend failures into a
//! degraded status instead of propagating them.

use thiserror::Error;

/// Top-level error type for hearth-core operations.
///
/// Provides structured error variants for all failure modes in the core
/// library, enabling precise error handling and informative error messages.
#[derive(Debug, Error)]
pub enum HearthError {
    /// A referenced device does not exist in the structural index.
    ///
    /// # When This Occurs
    ///
    /// - Looking up a device by an id that was never upserted
    /// - Resolving a name whose best fuzzy match falls below the threshold
    /// - Referencing a device after it was removed
    #[error("Device not found: {reference}")]
    DeviceNotFound {
        /// The id or name that failed to resolve.
        reference: String,
    },

    /// Strict name resolution matched more than one distinct device.
    ///
    /// # When This Occurs
    ///
    /// - Two devices carry byte-identical names and the caller used
    ///   `resolve_strict`, which refuses to guess between them
    ///
    /// Non-strict resolution never produces this: ties are broken
    /// deterministically (smallest edit distance, then lexicographic).
    #[error("Ambiguous match for '{query}': {candidates:?}")]
    AmbiguousMatch {
        /// The query that matched multiple devices.
        query: String,
        /// Ids of the tied candidates.
        candidates: Vec<String>,
    },

    /// The embedding/search backend is unreachable.
    ///
    /// # When This Occurs
    ///
    /// - Embedding inference endpoint is down or timing out
    /// - Provider reports not-ready during warmup
    ///
    /// Recoverable: the semantic search path catches this internally and
    /// returns a degraded result; the sync scheduler re-queues and retries
    /// on the next flush cycle.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A value failed range or shape validation.
    ///
    /// # When This Occurs
    ///
    /// - Event attribute payload has an unrecognized shape at ingestion
    /// - A confidence or threshold outside [0, 1] reaches a constructor
    /// - A malformed time range is supplied to an event query
    #[error("Invalid range for {field}: {message}")]
    InvalidRange {
        /// Name of the offending field.
        field: String,
        /// Description of the validation failure.
        message: String,
    },

    /// Configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error during serialization or deserialization.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An upstream device or event source failed.
    ///
    /// # When This Occurs
    ///
    /// - `DeviceSource::snapshot` fails during engine start
    /// - `EventSource::recent_events` fails during a diagnostic run
    ///
    /// The diagnostic orchestrator downgrades this to a degraded report
    /// section rather than failing the whole request.
    #[error("Source error: {0}")]
    SourceError(String),

    /// An unexpected internal error occurred.
    ///
    /// These indicate bugs (invariant violations, corrupted state) and
    /// should be reported rather than handled.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for HearthError {
    fn from(err: serde_json::Error) -> Self {
        HearthError::SerializationError(err.to_string())
    }
}

impl From<config::ConfigError> for HearthError {
    fn from(err: config::ConfigError) -> Self {
        HearthError::ConfigError(err.to_string())
    }
}

/// Result type alias for core operations.
pub type HearthResult<T> = Result<T, HearthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_not_found_display() {
        let err = HearthError::DeviceNotFound {
            reference: "kitchen light".into(),
        };
        assert!(err.to_string().contains("kitchen light"));
    }

    #[test]
    fn test_ambiguous_match_lists_candidates() {
        let err = HearthError::AmbiguousMatch {
            query: "lamp".into(),
            candidates: vec!["st:1".into(), "ha:2".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("lamp"));
        assert!(msg.contains("st:1"));
    }

    #[test]
    fn test_serde_error_conversion() {
        let json_err = serde_json::from_str::<u32>("not a number").unwrap_err();
        let err: HearthError = json_err.into();
        assert!(matches!(err, HearthError::SerializationError(_)));
    }
}
