//! Deterministic document text composition.
//!
//! The text for an unchanged entity must be byte-identical across rebuilds
//! so the index can skip the embedding call; every collection iterated
//! here is either already sorted (BTreeSet) or sorted locally.

use crate::types::{AutomationDocument, Device, IssuePattern};

/// Maximum state attributes included in the summary. Device state blobs
/// can be large; a handful of attributes is enough semantic signal.
const MAX_STATE_ATTRS: usize = 6;

/// Compose the searchable text for a device document.
pub fn compose_device_text(device: &Device) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(6);
    parts.push(device.name.clone());

    if !device.aliases.is_empty() {
        let mut aliases = device.aliases.clone();
        aliases.sort();
        parts.push(format!("also known as {}", aliases.join(", ")));
    }
    if let Some(room) = &device.room {
        parts.push(format!("in the {room}"));
    }
    parts.push(format!("platform {}", device.platform.as_str()));

    if !device.capabilities.is_empty() {
        let caps: Vec<&str> = device.capabilities.iter().map(|c| c.as_str()).collect();
        parts.push(format!("capabilities: {}", caps.join(", ")));
    }

    if let Some(summary) = summarize_state(&device.state) {
        parts.push(format!("state: {summary}"));
    }

    parts.join(". ")
}

/// Compose the searchable text for an automation document.
pub fn compose_automation_text(automation: &AutomationDocument) -> String {
    let mut parts = vec![format!("automation {}", automation.name)];
    if !automation.trigger_device_ids.is_empty() {
        let ids: Vec<&str> = automation
            .trigger_device_ids
            .iter()
            .map(|id| id.as_str())
            .collect();
        parts.push(format!("triggered by {}", ids.join(", ")));
    }
    if !automation.action_device_ids.is_empty() {
        let ids: Vec<&str> = automation
            .action_device_ids
            .iter()
            .map(|id| id.as_str())
            .collect();
        parts.push(format!("controls {}", ids.join(", ")));
    }
    parts.join(". ")
}

/// Compose the searchable text for a device's recent behavior patterns.
pub fn compose_pattern_text(device_name: &str, patterns: &[IssuePattern]) -> String {
    let mut parts = vec![format!("recent behavior of {device_name}")];
    for pattern in patterns {
        parts.push(format!(
            "{} ({} occurrences): {}",
            pattern.kind.as_str(),
            pattern.occurrences,
            pattern.description
        ));
    }
    parts.join(". ")
}

/// Short usage summary from an opaque state snapshot: scalar top-level
/// attributes only, key-sorted, capped.
fn summarize_state(state: &serde_json::Value) -> Option<String> {
    let map = state.as_object()?;
    let mut entries: Vec<String> = map
        .iter()
        .filter_map(|(key, value)| match value {
            serde_json::Value::Bool(b) => Some(format!("{key} {b}")),
            serde_json::Value::Number(n) => Some(format!("{key} {n}")),
            serde_json::Value::String(s) => Some(format!("{key} {s}")),
            _ => None,
        })
        .collect();
    if entries.is_empty() {
        return None;
    }
    entries.sort();
    entries.truncate(MAX_STATE_ATTRS);
    Some(entries.join(", "))
}
