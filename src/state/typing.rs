//! Typing notification cache.
//!
//! Typing state is never persisted. The cache owns its own position counter,
//! which restarts at zero with the process; every add, removal or expiry
//! issues a fresh position and stamps the affected room with it.

use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use syncd_proto::{RoomId, StreamPosition, TypingNotice, UserId};
use tokio::time::Instant;

use crate::db::PositionRange;

#[derive(Debug, Default)]
struct RoomTyping {
    /// Typing users and when their notice expires.
    users: HashMap<UserId, Instant>,
    /// Position of the last change in this room.
    position: StreamPosition,
}

impl RoomTyping {
    fn notice(&self, room_id: &RoomId) -> TypingNotice {
        let mut user_ids: Vec<UserId> = self.users.keys().cloned().collect();
        user_ids.sort();
        TypingNotice {
            room_id: room_id.clone(),
            user_ids,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    latest: u64,
    rooms: HashMap<RoomId, RoomTyping>,
}

impl Inner {
    fn bump(&mut self, room_id: &RoomId) -> StreamPosition {
        self.latest += 1;
        let pos = StreamPosition::new(self.latest);
        self.rooms.entry(room_id.clone()).or_default().position = pos;
        pos
    }
}

/// Who is typing where, with a monotonic change counter.
#[derive(Debug, Default)]
pub struct TypingCache {
    inner: Mutex<Inner>,
}

impl TypingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `user_id` as typing in `room_id` for `timeout`.
    pub fn add(&self, room_id: &RoomId, user_id: &UserId, timeout: Duration) -> StreamPosition {
        let expires = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        inner
            .rooms
            .entry(room_id.clone())
            .or_default()
            .users
            .insert(user_id.clone(), expires);
        inner.bump(room_id)
    }

    /// Stop `user_id` typing in `room_id`.
    ///
    /// Returns `None` when the user was not typing, so no position is issued.
    pub fn remove(&self, room_id: &RoomId, user_id: &UserId) -> Option<StreamPosition> {
        let mut inner = self.inner.lock();
        let removed = inner
            .rooms
            .get_mut(room_id)
            .is_some_and(|room| room.users.remove(user_id).is_some());
        removed.then(|| inner.bump(room_id))
    }

    /// Drop every notice that expired at or before `now`.
    ///
    /// Returns each affected room with the position its change was issued at.
    pub fn expire(&self, now: Instant) -> Vec<(RoomId, StreamPosition)> {
        let mut inner = self.inner.lock();
        let affected: Vec<RoomId> = inner
            .rooms
            .iter_mut()
            .filter_map(|(room_id, room)| {
                let before = room.users.len();
                room.users.retain(|_, expires| *expires > now);
                (room.users.len() != before).then(|| room_id.clone())
            })
            .collect();

        affected
            .into_iter()
            .map(|room_id| {
                let pos = inner.bump(&room_id);
                (room_id, pos)
            })
            .collect()
    }

    /// Highest position issued so far.
    pub fn latest_position(&self) -> StreamPosition {
        StreamPosition::new(self.inner.lock().latest)
    }

    /// Current typing sets of rooms in `rooms` that changed within `range`.
    ///
    /// Typing is state, not a log: each room appears at most once with the
    /// users typing now, which may be empty when everyone stopped.
    pub fn notices_in_range(
        &self,
        rooms: &BTreeSet<RoomId>,
        range: PositionRange,
    ) -> Vec<TypingNotice> {
        if range.is_empty() {
            return Vec::new();
        }
        let inner = self.inner.lock();
        rooms
            .iter()
            .filter_map(|room_id| {
                let room = inner.rooms.get(room_id)?;
                range.contains(room.position).then(|| room.notice(room_id))
            })
            .collect()
    }
}
