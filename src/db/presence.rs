//! Presence repository.

use super::device_lists::push_shared_room_filter;
use super::{DbError, PositionRange, parse_id, to_position};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::BTreeSet;
use syncd_proto::{Presence, PresenceUpdate, RoomId, StreamPosition, UserId};

const TABLE: &str = "presence";

/// Repository for the latest presence of each user.
pub struct PresenceRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> PresenceRepository<'a> {
    /// Create a new presence repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Replace the presence of `user_id`.
    ///
    /// Returns `None` without writing when the stored presence was active more
    /// recently, or is identical to the update.
    pub async fn store_presence(
        &self,
        user_id: &UserId,
        presence: Presence,
        status_msg: Option<&str>,
        last_active_ts: u64,
    ) -> Result<Option<StreamPosition>, DbError> {
        let ts = i64::try_from(last_active_ts).unwrap_or(i64::MAX);
        let result = sqlx::query(
            r#"
            INSERT OR REPLACE INTO presence (user_id, presence, status_msg, last_active_ts)
            SELECT ?, ?, ?, ?
            WHERE NOT EXISTS (
                SELECT 1 FROM presence
                WHERE user_id = ?
                  AND (last_active_ts > ?
                       OR (last_active_ts = ? AND presence = ? AND status_msg IS ?))
            )
            "#,
        )
        .bind(user_id.as_str())
        .bind(presence.as_str())
        .bind(status_msg)
        .bind(ts)
        .bind(user_id.as_str())
        .bind(ts)
        .bind(ts)
        .bind(presence.as_str())
        .bind(status_msg)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(to_position(result.last_insert_rowid())))
    }

    /// Presence changes within `range` of `user_id` or anyone joined to `rooms`.
    pub async fn presence_in_range(
        &self,
        user_id: &UserId,
        rooms: &BTreeSet<RoomId>,
        range: PositionRange,
    ) -> Result<Vec<PresenceUpdate>, DbError> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        let (from, to) = range.bounds();

        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT id, user_id, presence, status_msg, last_active_ts FROM presence WHERE id > ",
        );
        qb.push_bind(from);
        qb.push(" AND id <= ");
        qb.push_bind(to);
        qb.push(" AND (user_id = ");
        qb.push_bind(user_id.to_string());
        push_shared_room_filter(&mut qb, rooms);
        qb.push(") ORDER BY id ASC");

        let rows = qb
            .build_query_as::<(i64, String, String, Option<String>, i64)>()
            .fetch_all(self.pool)
            .await?;

        rows.into_iter()
            .map(|(id, user, presence, status_msg, last_active_ts)| {
                Ok(PresenceUpdate {
                    position: to_position(id),
                    user_id: parse_id(TABLE, user)?,
                    presence: presence
                        .parse()
                        .map_err(|reason| DbError::Corrupt { table: TABLE, reason })?,
                    status_msg,
                    last_active_ts: u64::try_from(last_active_ts).unwrap_or_default(),
                })
            })
            .collect()
    }
}
