//! Fixed-history event source.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Duration;

use crate::error::HearthResult;
use crate::traits::EventSource;
use crate::types::{DeviceId, EventRecord};

/// Event source serving fixed per-device histories.
///
/// Fixture behavior: the lookback window is ignored and the full stored
/// history is returned (sorted ascending), so tests can use arbitrary
/// fixed epochs without anchoring them to the wall clock.
#[derive(Debug, Default)]
pub struct StaticEventSource {
    events: HashMap<DeviceId, Vec<EventRecord>>,
}

impl StaticEventSource {
    pub fn new(events: HashMap<DeviceId, Vec<EventRecord>>) -> Self {
        Self { events }
    }

    pub fn with_events(mut self, device_id: DeviceId, events: Vec<EventRecord>) -> Self {
        self.events.insert(device_id, events);
        self
    }
}

#[async_trait]
impl EventSource for StaticEventSource {
    async fn recent_events(
        &self,
        device_id: &DeviceId,
        _window: Duration,
    ) -> HearthResult<Vec<EventRecord>> {
        let mut events = self.events.get(device_id).cloned().unwrap_or_default();
        events.sort_by_key(|e| e.epoch_ms);
        Ok(events)
    }
}
