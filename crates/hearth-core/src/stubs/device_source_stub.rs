//! Fixed-population device source.

use async_trait::async_trait;

use crate::error::HearthResult;
use crate::traits::DeviceSource;
use crate::types::Device;

/// Device source serving a fixed snapshot.
#[derive(Debug, Default)]
pub struct StaticDeviceSource {
    devices: Vec<Device>,
}

impl StaticDeviceSource {
    pub fn new(devices: Vec<Device>) -> Self {
        Self { devices }
    }
}

#[async_trait]
impl DeviceSource for StaticDeviceSource {
    async fn snapshot(&self) -> HearthResult<Vec<Device>> {
        Ok(self.devices.clone())
    }
}
