//! Semantic document projections and ranked search results.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::{Capability, Device, DeviceId, Platform};

/// What kind of entity a semantic document describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Device,
    Automation,
    EventPattern,
}

/// Filterable metadata carried alongside a document's embedding.
///
/// Holds only derived, non-authoritative fields; the structural index
/// remains the source of truth for device identity and state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default)]
    pub platform: Option<Platform>,
    #[serde(default)]
    pub capabilities: BTreeSet<Capability>,
    /// Devices this document relates to (the device itself, or an
    /// automation's triggers and actions).
    #[serde(default)]
    pub device_ids: Vec<DeviceId>,
}

impl DocumentMetadata {
    /// Derive metadata for a device document.
    pub fn for_device(device: &Device) -> Self {
        Self {
            room: device.room.clone(),
            platform: Some(device.platform.clone()),
            capabilities: device.capabilities.clone(),
            device_ids: vec![device.id.clone()],
        }
    }
}

/// An automation known to the semantic index, used to discover
/// device↔automation relationships during diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationDocument {
    pub id: String,
    pub name: String,
    /// Devices whose events can fire this automation.
    pub trigger_device_ids: Vec<DeviceId>,
    /// Devices this automation acts on.
    pub action_device_ids: Vec<DeviceId>,
}

impl AutomationDocument {
    /// Whether the automation references the given device as trigger or
    /// action.
    pub fn references(&self, device_id: &DeviceId) -> bool {
        self.trigger_device_ids.contains(device_id) || self.action_device_ids.contains(device_id)
    }
}

/// One ranked semantic search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedHit {
    /// Document id (device id, automation id, or pattern document id).
    pub id: String,
    pub kind: DocumentKind,
    /// Combined score: cosine similarity plus any capability boost.
    pub score: f32,
}

/// A device hydrated from a semantic hit, for the outer service layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedDevice {
    pub device: Device,
    pub score: f32,
}
