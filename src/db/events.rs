//! Room timeline repository.

use super::{DbError, PositionRange, from_json, parse_id, to_json, to_position};
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use syncd_proto::{RoomEvent, RoomId, StreamEvent, StreamPosition, TimelineChunk, UserId};

const TABLE: &str = "room_events";

type EventRow = (i64, String, String, String, String, Option<String>, String, i64);

/// Result of storing a room event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredEvent {
    pub position: StreamPosition,
    /// `false` when the event was already stored by an earlier delivery.
    pub inserted: bool,
}

/// Repository for room timeline events and the membership they imply.
pub struct EventRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> EventRepository<'a> {
    /// Create a new event repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist an event and return its stream position.
    ///
    /// Membership events also update `room_memberships` in the same
    /// transaction. Redelivered events keep the position they were first
    /// stored at and change nothing.
    pub async fn store_event(&self, event: &RoomEvent) -> Result<StoredEvent, DbError> {
        let content = to_json(&event.content)?;
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO room_events (event_id, room_id, sender, event_type, state_key, content, origin_server_ts)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(event_id) DO NOTHING
            "#,
        )
        .bind(event.event_id.as_str())
        .bind(event.room_id.as_str())
        .bind(event.sender.as_str())
        .bind(&event.event_type)
        .bind(event.state_key.as_deref())
        .bind(&content)
        .bind(i64::try_from(event.origin_server_ts).unwrap_or(i64::MAX))
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let id: i64 = sqlx::query_scalar("SELECT id FROM room_events WHERE event_id = ?")
                .bind(event.event_id.as_str())
                .fetch_one(&mut *tx)
                .await?;
            tx.commit().await?;
            return Ok(StoredEvent {
                position: to_position(id),
                inserted: false,
            });
        }

        let id = result.last_insert_rowid();

        if let Some((target, membership)) = event.membership() {
            sqlx::query(
                r#"
                INSERT INTO room_memberships (room_id, user_id, membership, event_position)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(room_id, user_id) DO UPDATE SET
                    membership = excluded.membership,
                    event_position = excluded.event_position
                "#,
            )
            .bind(event.room_id.as_str())
            .bind(target.as_str())
            .bind(membership.as_str())
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(StoredEvent {
            position: to_position(id),
            inserted: true,
        })
    }

    /// Timeline slices for `rooms` within `range`, newest `limit` events per room.
    ///
    /// Rooms without events in the range are omitted. A chunk is `limited`
    /// when older events inside the range were cut off.
    pub async fn timeline(
        &self,
        rooms: &BTreeSet<RoomId>,
        range: PositionRange,
        limit: usize,
    ) -> Result<Vec<TimelineChunk>, DbError> {
        if range.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let (from, to) = range.bounds();
        let fetch = i64::try_from(limit).unwrap_or(i64::MAX - 1) + 1;

        let mut chunks = Vec::new();
        for room_id in rooms {
            let rows = sqlx::query_as::<_, EventRow>(
                r#"
                SELECT id, event_id, room_id, sender, event_type, state_key, content, origin_server_ts
                FROM room_events
                WHERE room_id = ? AND id > ? AND id <= ?
                ORDER BY id DESC
                LIMIT ?
                "#,
            )
            .bind(room_id.as_str())
            .bind(from)
            .bind(to)
            .bind(fetch)
            .fetch_all(self.pool)
            .await?;

            if rows.is_empty() {
                continue;
            }
            let limited = rows.len() > limit;
            let mut events = rows
                .into_iter()
                .take(limit)
                .map(row_to_event)
                .collect::<Result<Vec<_>, _>>()?;
            events.reverse();

            chunks.push(TimelineChunk {
                room_id: room_id.clone(),
                events,
                limited,
            });
        }
        Ok(chunks)
    }

    /// Rooms `user` is currently joined to.
    pub async fn joined_rooms(&self, user: &UserId) -> Result<Vec<RoomId>, DbError> {
        let rows: Vec<String> = sqlx::query_scalar(
            "SELECT room_id FROM room_memberships WHERE user_id = ? AND membership = 'join' ORDER BY room_id",
        )
        .bind(user.as_str())
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|room| parse_id("room_memberships", room))
            .collect()
    }

    /// Rooms where `user`'s membership changed within `range`, whatever it is now.
    ///
    /// Lets a user who just left or was banned still receive that event.
    pub async fn membership_changes(
        &self,
        user: &UserId,
        range: PositionRange,
    ) -> Result<Vec<RoomId>, DbError> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        let (from, to) = range.bounds();
        let rows: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT room_id FROM room_memberships
            WHERE user_id = ? AND event_position > ? AND event_position <= ?
            ORDER BY room_id
            "#,
        )
        .bind(user.as_str())
        .bind(from)
        .bind(to)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|room| parse_id("room_memberships", room))
            .collect()
    }
}

fn row_to_event(row: EventRow) -> Result<StreamEvent, DbError> {
    let (id, event_id, room_id, sender, event_type, state_key, content, origin_server_ts) = row;
    Ok(StreamEvent {
        position: to_position(id),
        event: RoomEvent {
            event_id: parse_id(TABLE, event_id)?,
            room_id: parse_id(TABLE, room_id)?,
            sender: parse_id(TABLE, sender)?,
            event_type,
            state_key,
            content: from_json(TABLE, &content)?,
            origin_server_ts: u64::try_from(origin_server_ts).unwrap_or_default(),
        },
    })
}
