//! Event history supply.

use async_trait::async_trait;
use chrono::Duration;

use crate::error::HearthResult;
use crate::types::{DeviceId, EventRecord};

/// Supplier of per-device event histories over a bounded retention window.
///
/// Upstream pagination is the adapter's concern; this core sees the merged
/// window. Records are immutable once returned.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Events for one device within `window` of now, oldest first.
    ///
    /// Implementations should return records sorted ascending by epoch,
    /// but the pattern detector re-sorts before any gap arithmetic, so
    /// ordering is not a hard contract.
    async fn recent_events(
        &self,
        device_id: &DeviceId,
        window: Duration,
    ) -> HearthResult<Vec<EventRecord>>;
}
