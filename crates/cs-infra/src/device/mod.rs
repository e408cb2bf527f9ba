//! Local device identity implementation.
//!
//! The device id is a UUID stored as plain text in the application data directory.
//! It is attached to every upload and to the realtime channel path.
//!
//! 设备 ID 以纯文本 UUID 形式保存在应用数据目录中。

mod storage;

use anyhow::Result;
use std::path::PathBuf;

use cs_core::ports::DeviceIdentityPort;
use cs_core::DeviceId;

/// Local filesystem-backed device identity.
pub struct LocalDeviceIdentity {
    device_id: DeviceId,
}

impl LocalDeviceIdentity {
    /// Load the existing device id or create and persist a new one.
    ///
    /// Fails on I/O errors; the engine must not start without an identity.
    pub fn load_or_create(config_dir: PathBuf) -> Result<Self> {
        if let Some(id) = storage::load_from_disk(&config_dir)? {
            Ok(Self { device_id: id })
        } else {
            let id = DeviceId::new();
            storage::save_to_disk(&config_dir, &id)?;
            tracing::info!(device_id = %id, "Created new device identity");
            Ok(Self { device_id: id })
        }
    }
}

impl DeviceIdentityPort for LocalDeviceIdentity {
    fn current_device_id(&self) -> DeviceId {
        self.device_id.clone()
    }
}
