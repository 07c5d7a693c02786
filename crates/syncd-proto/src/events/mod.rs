//! Payload types carried by each category.
//!
//! The sync core never looks inside these; it only needs the position of a
//! change and the room or user it is scoped to. Types prefixed with `Stream`
//! pair a payload with the position it was stored at.

mod account;
mod device;
mod ephemeral;
mod room;

pub use account::{AccountData, NotificationData, StreamAccountData, StreamNotificationData};
pub use device::{DeviceListUpdate, SendToDeviceEvent, StreamSendToDevice};
pub use ephemeral::{Presence, PresenceContent, PresenceUpdate, Receipt, StreamReceipt, TypingNotice};
pub use room::{
    InviteEvent, MEMBER_EVENT_TYPE, Membership, RoomEvent, StreamEvent, StreamInvite, TimelineChunk,
};
