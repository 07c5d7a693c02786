use serde::Deserialize;
use syncd_proto::{DeviceId, UserId};

/// One long-poll sync request, already authenticated.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncRequest {
    pub user_id: UserId,
    #[serde(default)]
    pub device_id: Option<DeviceId>,
    /// Token from a previous response. `None` asks for an initial sync.
    #[serde(default)]
    pub since: Option<String>,
    /// Requested long-poll timeout. Clamped by configuration.
    #[serde(default, rename = "timeout")]
    pub timeout_ms: Option<u64>,
}

impl SyncRequest {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            device_id: None,
            since: None,
            timeout_ms: None,
        }
    }

    pub fn with_device(mut self, device_id: DeviceId) -> Self {
        self.device_id = Some(device_id);
        self
    }

    pub fn with_since(mut self, since: impl Into<String>) -> Self {
        self.since = Some(since.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}
