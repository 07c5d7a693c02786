//! Account data and notification count payloads.

use crate::id::{RoomId, UserId};
use crate::position::StreamPosition;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A piece of account data, global when `room_id` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountData {
    /// Owning user.
    pub user_id: UserId,
    /// Room the data is attached to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    /// Data type, e.g. `m.fully_read`.
    #[serde(rename = "type")]
    pub data_type: String,
    /// Data content.
    #[serde(default)]
    pub content: Value,
}

/// Account data together with its stream position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamAccountData {
    /// Position the data was stored at.
    pub position: StreamPosition,
    /// The data.
    pub data: AccountData,
}

/// Unread notification counts of a user in a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NotificationData {
    /// Unread notifications.
    pub notification_count: u32,
    /// Unread highlights.
    pub highlight_count: u32,
}

/// Notification counts together with their stream position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamNotificationData {
    /// Position the counts were stored at.
    pub position: StreamPosition,
    /// Room the counts are for.
    pub room_id: RoomId,
    /// The counts.
    pub counts: NotificationData,
}
