//! Room timeline and invite payloads.

use crate::id::{EventId, RoomId, UserId};
use crate::position::StreamPosition;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Event type of membership state events.
pub const MEMBER_EVENT_TYPE: &str = "m.room.member";

/// A room event as committed by the room server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomEvent {
    /// Globally unique event identifier.
    pub event_id: EventId,
    /// Room the event belongs to.
    pub room_id: RoomId,
    /// Sending user.
    pub sender: UserId,
    /// Event type, e.g. `m.room.message`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// State key; present only on state events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_key: Option<String>,
    /// Event content.
    #[serde(default)]
    pub content: Value,
    /// Origin timestamp in milliseconds.
    #[serde(default)]
    pub origin_server_ts: u64,
}

impl RoomEvent {
    /// Returns `true` for state events.
    #[must_use]
    pub fn is_state(&self) -> bool {
        self.state_key.is_some()
    }

    /// For membership events, the affected user and their new membership.
    ///
    /// Returns `None` for non-membership events and for membership events
    /// whose state key or membership value cannot be parsed.
    #[must_use]
    pub fn membership(&self) -> Option<(UserId, Membership)> {
        if self.event_type != MEMBER_EVENT_TYPE {
            return None;
        }
        let target = UserId::parse(self.state_key.clone()?).ok()?;
        let membership = self
            .content
            .get("membership")
            .and_then(Value::as_str)?
            .parse()
            .ok()?;
        Some((target, membership))
    }
}

/// Membership state of a user in a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Membership {
    /// Joined.
    Join,
    /// Invited but not joined.
    Invite,
    /// Left or kicked.
    Leave,
    /// Banned.
    Ban,
    /// Asked to join.
    Knock,
}

impl Membership {
    /// Wire string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Membership::Join => "join",
            Membership::Invite => "invite",
            Membership::Leave => "leave",
            Membership::Ban => "ban",
            Membership::Knock => "knock",
        }
    }
}

impl fmt::Display for Membership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Membership {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "join" => Ok(Membership::Join),
            "invite" => Ok(Membership::Invite),
            "leave" => Ok(Membership::Leave),
            "ban" => Ok(Membership::Ban),
            "knock" => Ok(Membership::Knock),
            other => Err(format!("unknown membership {other:?}")),
        }
    }
}

/// A timeline event together with its stream position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    /// Position the event was stored at.
    pub position: StreamPosition,
    /// The event.
    pub event: RoomEvent,
}

/// The timeline slice of one room for a sync response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineChunk {
    /// Room the events belong to.
    pub room_id: RoomId,
    /// Events in ascending position order.
    pub events: Vec<StreamEvent>,
    /// Whether older events in the requested range were left out.
    pub limited: bool,
}

/// An invite delivered to, or withdrawn from, a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InviteEvent {
    /// The `m.room.member` invite event.
    pub event: RoomEvent,
    /// Whether the invite was withdrawn, rejected or accepted.
    #[serde(default)]
    pub retired: bool,
}

/// An invite change together with its stream position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamInvite {
    /// Position the change was stored at.
    pub position: StreamPosition,
    /// Invited user.
    pub target: UserId,
    /// The invite and whether it is still outstanding.
    pub invite: InviteEvent,
}
