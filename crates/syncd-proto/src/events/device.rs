//! Send-to-device and device list payloads.

use crate::id::{DeviceId, UserId};
use crate::position::StreamPosition;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message addressed to one device of one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendToDeviceEvent {
    /// Sending user.
    pub sender: UserId,
    /// Event type, e.g. `m.room_key_request`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event content.
    #[serde(default)]
    pub content: Value,
}

/// A send-to-device message together with its stream position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSendToDevice {
    /// Position the message was stored at.
    pub position: StreamPosition,
    /// Recipient user.
    pub user_id: UserId,
    /// Recipient device.
    pub device_id: DeviceId,
    /// The message.
    pub event: SendToDeviceEvent,
}

/// A user whose device list changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceListUpdate {
    /// Latest position at which the user's devices changed.
    pub position: StreamPosition,
    /// User whose devices changed.
    pub user_id: UserId,
}
