use serde::Serialize;
use syncd_proto::{
    DeviceListUpdate, PresenceContent, StreamAccountData, StreamInvite, StreamNotificationData,
    StreamReceipt, StreamSendToDevice, StreamingToken, TimelineChunk, TypingNotice,
};

/// Everything that changed for one user between two tokens.
#[derive(Debug, Clone, Serialize)]
pub struct SyncResponse {
    /// Resume point for the next request.
    pub next_batch: StreamingToken,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub timeline: Vec<TimelineChunk>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub typing: Vec<TypingNotice>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub receipts: Vec<StreamReceipt>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub invites: Vec<StreamInvite>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub to_device: Vec<StreamSendToDevice>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub account_data: Vec<StreamAccountData>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub device_lists: Vec<DeviceListUpdate>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notification_counts: Vec<StreamNotificationData>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub presence: Vec<PresenceContent>,
}

impl SyncResponse {
    /// A response carrying no changes.
    pub fn empty(next_batch: StreamingToken) -> Self {
        Self {
            next_batch,
            timeline: Vec::new(),
            typing: Vec::new(),
            receipts: Vec::new(),
            invites: Vec::new(),
            to_device: Vec::new(),
            account_data: Vec::new(),
            device_lists: Vec::new(),
            notification_counts: Vec::new(),
            presence: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.timeline.is_empty()
            && self.typing.is_empty()
            && self.receipts.is_empty()
            && self.invites.is_empty()
            && self.to_device.is_empty()
            && self.account_data.is_empty()
            && self.device_lists.is_empty()
            && self.notification_counts.is_empty()
            && self.presence.is_empty()
    }

    /// Number of changes across all categories.
    pub fn change_count(&self) -> usize {
        self.timeline.iter().map(|c| c.events.len()).sum::<usize>()
            + self.typing.len()
            + self.receipts.len()
            + self.invites.len()
            + self.to_device.len()
            + self.account_data.len()
            + self.device_lists.len()
            + self.notification_counts.len()
            + self.presence.len()
    }
}
