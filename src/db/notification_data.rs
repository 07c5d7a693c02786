//! Unread notification count repository.

use super::{DbError, PositionRange, parse_id, to_position};
use sqlx::SqlitePool;
use syncd_proto::{NotificationData, RoomId, StreamNotificationData, StreamPosition, UserId};

const TABLE: &str = "notification_data";

/// Repository for per-room unread counts.
pub struct NotificationDataRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> NotificationDataRepository<'a> {
    /// Create a new notification data repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Replace the counts of `user_id` in `room_id`.
    pub async fn store_counts(
        &self,
        user_id: &UserId,
        room_id: &RoomId,
        counts: NotificationData,
    ) -> Result<StreamPosition, DbError> {
        let result = sqlx::query(
            r#"
            INSERT OR REPLACE INTO notification_data (user_id, room_id, notification_count, highlight_count)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(user_id.as_str())
        .bind(room_id.as_str())
        .bind(i64::from(counts.notification_count))
        .bind(i64::from(counts.highlight_count))
        .execute(self.pool)
        .await?;

        Ok(to_position(result.last_insert_rowid()))
    }

    /// Counts of `user_id` that changed within `range`, in position order.
    pub async fn counts_in_range(
        &self,
        user_id: &UserId,
        range: PositionRange,
    ) -> Result<Vec<StreamNotificationData>, DbError> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        let (from, to) = range.bounds();
        let rows: Vec<(i64, String, i64, i64)> = sqlx::query_as(
            r#"
            SELECT id, room_id, notification_count, highlight_count FROM notification_data
            WHERE user_id = ? AND id > ? AND id <= ?
            ORDER BY id ASC
            "#,
        )
        .bind(user_id.as_str())
        .bind(from)
        .bind(to)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, room_id, notifications, highlights)| {
                Ok(StreamNotificationData {
                    position: to_position(id),
                    room_id: parse_id(TABLE, room_id)?,
                    counts: NotificationData {
                        notification_count: u32::try_from(notifications).unwrap_or_default(),
                        highlight_count: u32::try_from(highlights).unwrap_or_default(),
                    },
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[tokio::test]
    async fn only_latest_counts_per_room_survive() {
        let db = Database::new(":memory:").await.unwrap();
        let repo = db.notification_data();
        let alice = UserId::parse("@alice:test").unwrap();
        let room = RoomId::parse("!r:test").unwrap();

        repo.store_counts(&alice, &room, NotificationData { notification_count: 1, highlight_count: 0 })
            .await
            .unwrap();
        let latest = repo
            .store_counts(&alice, &room, NotificationData { notification_count: 3, highlight_count: 1 })
            .await
            .unwrap();

        let rows = repo
            .counts_in_range(&alice, PositionRange::new(StreamPosition::ZERO, latest))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].counts.notification_count, 3);
        assert_eq!(rows[0].counts.highlight_count, 1);
        assert_eq!(rows[0].position, latest);
    }
}
