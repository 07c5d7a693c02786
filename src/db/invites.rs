//! Invite repository.

use super::{DbError, PositionRange, from_json, parse_id, to_json, to_position};
use sqlx::SqlitePool;
use syncd_proto::{EventId, InviteEvent, RoomEvent, RoomId, StreamInvite, StreamPosition, UserId};

const TABLE: &str = "invites";

/// Repository for room invites.
pub struct InviteRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> InviteRepository<'a> {
    /// Create a new invite repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Store an outstanding invite for `target`.
    ///
    /// Returns `None` when the invite event was already stored, whether it is
    /// still outstanding or has since been retired.
    pub async fn store_invite(
        &self,
        target: &UserId,
        event: &RoomEvent,
    ) -> Result<Option<StreamPosition>, DbError> {
        let event_json = to_json(event)?;
        let result = sqlx::query(
            r#"
            INSERT INTO invites (event_id, room_id, target_user_id, event_json, retired)
            VALUES (?, ?, ?, ?, 0)
            ON CONFLICT(event_id) DO NOTHING
            "#,
        )
        .bind(event.event_id.as_str())
        .bind(event.room_id.as_str())
        .bind(target.as_str())
        .bind(&event_json)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(to_position(result.last_insert_rowid())))
    }

    /// Retire an invite by event ID.
    ///
    /// Returns the invited user and the new position, or `None` when the
    /// invite is unknown or already retired.
    pub async fn retire_invite(
        &self,
        event_id: &EventId,
    ) -> Result<Option<(UserId, StreamPosition)>, DbError> {
        let row: Option<(i64, String)> = sqlx::query_as(
            r#"
            INSERT OR REPLACE INTO invites (event_id, room_id, target_user_id, event_json, retired)
            SELECT event_id, room_id, target_user_id, event_json, 1 FROM invites
            WHERE event_id = ? AND retired = 0
            RETURNING id, target_user_id
            "#,
        )
        .bind(event_id.as_str())
        .fetch_optional(self.pool)
        .await?;

        let Some((id, target)) = row else {
            return Ok(None);
        };
        Ok(Some((parse_id(TABLE, target)?, to_position(id))))
    }

    /// Outstanding invite event for `target` in `room`, if any.
    pub async fn pending_invite(
        &self,
        room: &RoomId,
        target: &UserId,
    ) -> Result<Option<EventId>, DbError> {
        let row: Option<String> = sqlx::query_scalar(
            "SELECT event_id FROM invites WHERE room_id = ? AND target_user_id = ? AND retired = 0 ORDER BY id DESC LIMIT 1",
        )
        .bind(room.as_str())
        .bind(target.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(|id| parse_id(TABLE, id)).transpose()
    }

    /// Invite changes for `target` within `range`, in position order.
    pub async fn invites_in_range(
        &self,
        target: &UserId,
        range: PositionRange,
    ) -> Result<Vec<StreamInvite>, DbError> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        let (from, to) = range.bounds();
        let rows: Vec<(i64, String, bool)> = sqlx::query_as(
            r#"
            SELECT id, event_json, retired FROM invites
            WHERE target_user_id = ? AND id > ? AND id <= ?
            ORDER BY id ASC
            "#,
        )
        .bind(target.as_str())
        .bind(from)
        .bind(to)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, event_json, retired)| {
                Ok(StreamInvite {
                    position: to_position(id),
                    target: target.clone(),
                    invite: InviteEvent {
                        event: from_json(TABLE, &event_json)?,
                        retired,
                    },
                })
            })
            .collect()
    }
}
