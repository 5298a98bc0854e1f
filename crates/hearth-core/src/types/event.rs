//! Event records and their validated attribute payloads.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{HearthError, HearthResult};
use crate::types::{Capability, DeviceId};

/// Closed tagged union of event attribute values.
///
/// Raw platform payloads are validated into one of these shapes at
/// ingestion; anything unrecognized is rejected with
/// [`HearthError::InvalidRange`] instead of being passed through untyped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttributeValue {
    /// Boolean state (contact open/closed, presence, etc.).
    Bool { value: bool },
    /// Numeric reading with an optional unit (temperature, battery, power).
    Numeric { value: f64, unit: Option<String> },
    /// Enumerated string state (`on`, `off`, `heating`, ...), normalized
    /// to lowercase.
    Enum { value: String },
}

impl AttributeValue {
    /// Validate a raw JSON payload into a typed value.
    ///
    /// Accepted shapes:
    /// - JSON bool → `Bool`
    /// - JSON number → `Numeric` without unit
    /// - `{ "value": <number>, "unit": <string> }` → `Numeric` with unit
    /// - JSON string → `Enum`
    ///
    /// # Errors
    ///
    /// `InvalidRange` for nulls, arrays, non-finite numbers, and objects
    /// that do not match the numeric-with-unit shape.
    pub fn parse(attribute: &str, raw: &serde_json::Value) -> HearthResult<Self> {
        match raw {
            serde_json::Value::Bool(b) => Ok(AttributeValue::Bool { value: *b }),
            serde_json::Value::Number(n) => {
                let value = n.as_f64().filter(|v| v.is_finite()).ok_or_else(|| {
                    HearthError::InvalidRange {
                        field: attribute.to_string(),
                        message: format!("non-finite numeric value: {n}"),
                    }
                })?;
                Ok(AttributeValue::Numeric { value, unit: None })
            }
            serde_json::Value::String(s) => Ok(AttributeValue::Enum {
                value: s.trim().to_lowercase(),
            }),
            serde_json::Value::Object(map) => {
                let value = map
                    .get("value")
                    .and_then(|v| v.as_f64())
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| HearthError::InvalidRange {
                        field: attribute.to_string(),
                        message: "object payload requires a finite numeric 'value'".into(),
                    })?;
                let unit = map.get("unit").and_then(|u| u.as_str()).map(String::from);
                Ok(AttributeValue::Numeric { value, unit })
            }
            other => Err(HearthError::InvalidRange {
                field: attribute.to_string(),
                message: format!("unrecognized attribute payload shape: {other}"),
            }),
        }
    }

    /// Whether this value kind participates in rapid-change detection.
    ///
    /// Boolean and enum states are discrete; a flip between two readings
    /// is a state change. Numeric readings drift continuously and are
    /// excluded.
    pub fn is_stateful(&self) -> bool {
        matches!(
            self,
            AttributeValue::Bool { .. } | AttributeValue::Enum { .. }
        )
    }

    /// Whether this value reads as "off" (false, or the literal `off`).
    pub fn is_off(&self) -> bool {
        match self {
            AttributeValue::Bool { value } => !value,
            AttributeValue::Enum { value } => value == "off",
            AttributeValue::Numeric { .. } => false,
        }
    }

    /// Whether this value reads as "on" (true, or the literal `on`).
    pub fn is_on(&self) -> bool {
        match self {
            AttributeValue::Bool { value } => *value,
            AttributeValue::Enum { value } => value == "on",
            AttributeValue::Numeric { .. } => false,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Bool { value } => write!(f, "{value}"),
            AttributeValue::Numeric { value, unit: Some(u) } => write!(f, "{value} {u}"),
            AttributeValue::Numeric { value, unit: None } => write!(f, "{value}"),
            AttributeValue::Enum { value } => f.write_str(value),
        }
    }
}

/// One immutable device event within the retention window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub device_id: DeviceId,
    /// Event time as epoch milliseconds.
    pub epoch_ms: i64,
    pub capability: Capability,
    pub attribute: String,
    pub value: AttributeValue,
}

impl EventRecord {
    pub fn new(
        device_id: DeviceId,
        epoch_ms: i64,
        capability: impl AsRef<str>,
        attribute: impl Into<String>,
        value: AttributeValue,
    ) -> Self {
        Self {
            device_id,
            epoch_ms,
            capability: Capability::new(capability),
            attribute: attribute.into(),
            value,
        }
    }

    /// Event time as a UTC timestamp. Out-of-range epochs fall back to the
    /// Unix epoch rather than panicking; the detector only uses this for
    /// the off-peak window check.
    pub fn timestamp(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.epoch_ms)
            .single()
            .unwrap_or_else(|| Utc.timestamp_millis_opt(0).single().unwrap_or_default())
    }
}
