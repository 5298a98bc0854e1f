//! Device identity and structural metadata.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique device identifier: `platform:platform_local_id`.
///
/// Uniqueness is per platform + platform-local id, so two platforms can
/// expose devices with the same local id without colliding.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Compose an id from a platform and its local device id.
    pub fn new(platform: &Platform, local_id: &str) -> Self {
        Self(format!("{}:{}", platform.as_str(), local_id))
    }

    /// Wrap an already-composed id string.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The composed id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source platform a device belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    SmartThings,
    HomeAssistant,
    Tuya,
    /// Escape hatch for platforms this core has no dedicated variant for.
    Other(String),
}

impl Platform {
    /// Stable lowercase identifier used in composed device ids and
    /// secondary index keys.
    pub fn as_str(&self) -> &str {
        match self {
            Platform::SmartThings => "smartthings",
            Platform::HomeAssistant => "home_assistant",
            Platform::Tuya => "tuya",
            Platform::Other(name) => name.as_str(),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A device capability (e.g. `switch`, `temperature`, `battery`).
///
/// Open vocabulary, normalized to lowercase on construction so index keys
/// and boost comparisons are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capability(String);

impl Capability {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A smart-home device as known to the structural index.
///
/// The structural index is the source of truth for identity and state;
/// the semantic index only ever holds a derived projection of this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Unique id (platform + platform-local id).
    pub id: DeviceId,
    /// Display name as reported by the platform.
    pub name: String,
    /// Alternative names users refer to this device by.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Room assignment, if any.
    #[serde(default)]
    pub room: Option<String>,
    /// Owning platform.
    pub platform: Platform,
    /// Capability set. BTreeSet so iteration order is stable, which keeps
    /// the composed semantic document text deterministic.
    #[serde(default)]
    pub capabilities: BTreeSet<Capability>,
    /// Last time the platform reported this device alive.
    pub last_seen: DateTime<Utc>,
    /// Opaque state snapshot as supplied by the platform adapter.
    #[serde(default)]
    pub state: serde_json::Value,
}

impl Device {
    /// Create a device with the minimum required fields.
    pub fn new(platform: Platform, local_id: &str, name: impl Into<String>) -> Self {
        Self {
            id: DeviceId::new(&platform, local_id),
            name: name.into(),
            aliases: Vec::new(),
            room: None,
            platform,
            capabilities: BTreeSet::new(),
            last_seen: Utc::now(),
            state: serde_json::Value::Null,
        }
    }

    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.capabilities = capabilities.into_iter().map(Capability::new).collect();
        self
    }

    pub fn with_state(mut self, state: serde_json::Value) -> Self {
        self.state = state;
        self
    }

    /// Whether identity-level fields differ from `other`.
    ///
    /// Identity fields are name, aliases, room, platform and capabilities;
    /// the fields that change what the device *is* rather than what it is
    /// currently doing. The sync scheduler re-indexes identity changes
    /// immediately and defers state-only changes.
    pub fn identity_differs(&self, other: &Device) -> bool {
        self.name != other.name
            || self.aliases != other.aliases
            || self.room != other.room
            || self.platform != other.platform
            || self.capabilities != other.capabilities
    }
}

/// Exact-match filter for structural queries.
///
/// All present fields must match (set intersection); absent fields are
/// ignored. An empty filter matches every device.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceFilter {
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default)]
    pub platform: Option<Platform>,
    #[serde(default)]
    pub capability: Option<Capability>,
}

impl DeviceFilter {
    pub fn is_empty(&self) -> bool {
        self.room.is_none() && self.platform.is_none() && self.capability.is_none()
    }

    pub fn by_room(room: impl Into<String>) -> Self {
        Self {
            room: Some(room.into()),
            ..Default::default()
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn with_capability(mut self, capability: impl AsRef<str>) -> Self {
        self.capability = Some(Capability::new(capability));
        self
    }
}
