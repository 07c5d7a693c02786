//! Typing, receipt and presence payloads.

use crate::id::{EventId, RoomId, UserId};
use crate::position::StreamPosition;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The set of users currently typing in a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingNotice {
    /// Room the notice is for.
    pub room_id: RoomId,
    /// Users typing right now, sorted.
    pub user_ids: Vec<UserId>,
}

/// A read receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Room the receipt is for.
    pub room_id: RoomId,
    /// Receipt type, e.g. `m.read`.
    pub receipt_type: String,
    /// Reading user.
    pub user_id: UserId,
    /// Last event read.
    pub event_id: EventId,
    /// Time of the receipt in milliseconds.
    pub ts: u64,
}

/// A receipt together with its stream position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamReceipt {
    /// Position the receipt was stored at.
    pub position: StreamPosition,
    /// The receipt.
    pub receipt: Receipt,
}

/// A user's presence state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    /// Actively connected.
    Online,
    /// Connected but idle.
    Unavailable,
    /// Disconnected.
    Offline,
}

impl Presence {
    /// Wire string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Presence::Online => "online",
            Presence::Unavailable => "unavailable",
            Presence::Offline => "offline",
        }
    }
}

impl fmt::Display for Presence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Presence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(Presence::Online),
            "unavailable" => Ok(Presence::Unavailable),
            "offline" => Ok(Presence::Offline),
            other => Err(format!("unknown presence {other:?}")),
        }
    }
}

/// Client-facing presence content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceContent {
    /// Whether the user is currently active.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub currently_active: bool,
    /// Milliseconds since the user was last active.
    pub last_active_ago: u64,
    /// Presence state.
    pub presence: Presence,
    /// Optional status message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_msg: Option<String>,
    /// User the presence belongs to.
    pub user_id: UserId,
}

/// A stored presence change together with its stream position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceUpdate {
    /// Position the change was stored at.
    pub position: StreamPosition,
    /// User whose presence changed.
    pub user_id: UserId,
    /// New presence state.
    pub presence: Presence,
    /// Optional status message.
    pub status_msg: Option<String>,
    /// Absolute last-active time in milliseconds.
    pub last_active_ts: u64,
}

impl PresenceUpdate {
    /// Renders the client-facing content relative to `now_ms`.
    ///
    /// Users active within the last minute are reported as currently active.
    #[must_use]
    pub fn to_content(&self, now_ms: u64) -> PresenceContent {
        let last_active_ago = now_ms.saturating_sub(self.last_active_ts);
        PresenceContent {
            currently_active: self.presence == Presence::Online && last_active_ago < 60_000,
            last_active_ago,
            presence: self.presence,
            status_msg: self.status_msg.clone(),
            user_id: self.user_id.clone(),
        }
    }
}
