//! Device snapshot and mutation supply.

use async_trait::async_trait;

use crate::error::HearthResult;
use crate::types::{Device, DeviceId};

/// An incremental change to the device population.
///
/// Platform adapters push these into the engine's bounded ingest channel;
/// a single-owner task drains it so every structural mutation updates all
/// secondary maps atomically. This replaces callback/emitter-style update
/// notifications.
#[derive(Debug, Clone)]
pub enum DeviceMutation {
    /// Add a new device or replace an existing one wholesale.
    Upsert(Device),
    /// Remove a device and all of its index entries.
    Remove(DeviceId),
}

/// Supplier of device snapshots from a cloud platform adapter.
#[async_trait]
pub trait DeviceSource: Send + Sync {
    /// Fetch the full current device population.
    ///
    /// Used to seed the structural index at engine start; incremental
    /// changes afterwards flow through the mutation channel.
    async fn snapshot(&self) -> HearthResult<Vec<Device>>;
}
