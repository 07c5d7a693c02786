//! # syncd-proto
//!
//! Transport-independent types for the syncd-ng incremental sync engine.
//!
//! ## Features
//!
//! - Per-category stream positions ([`StreamPosition`], [`Category`])
//! - The composite, resumable [`StreamingToken`] with a stable string form
//! - Validated identifier newtypes ([`RoomId`], [`UserId`], [`EventId`], [`DeviceId`])
//! - Payload types for each synchronized category
//!
//! ## Quick Start
//!
//! ```rust
//! use syncd_proto::{Category, StreamPosition, StreamingToken};
//!
//! let since: StreamingToken = "s10_0_40".parse().expect("valid token");
//! assert_eq!(since.receipt, StreamPosition::new(40));
//!
//! let latest = since.with(Category::Receipt, StreamPosition::new(42));
//! assert!(latest.is_after(&since));
//! assert_eq!(latest.to_string(), "s10_0_42_0_0_0_0_0_0");
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod category;
pub mod error;
pub mod events;
pub mod id;
pub mod position;
pub mod token;

pub use self::category::Category;
pub use self::error::{IdError, TokenError};
pub use self::events::{
    AccountData, DeviceListUpdate, InviteEvent, Membership, NotificationData, Presence,
    PresenceContent, PresenceUpdate, Receipt, RoomEvent, SendToDeviceEvent, StreamAccountData,
    StreamEvent, StreamInvite, StreamNotificationData, StreamReceipt, StreamSendToDevice,
    TimelineChunk, TypingNotice,
};
pub use self::id::{DeviceId, EventId, RoomId, UserId};
pub use self::position::StreamPosition;
pub use self::token::StreamingToken;
