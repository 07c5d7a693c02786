//! Device list change repository.

use super::{DbError, PositionRange, parse_id, to_position};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::BTreeSet;
use syncd_proto::{DeviceListUpdate, RoomId, StreamPosition, UserId};

const TABLE: &str = "device_list_changes";

/// Repository for device list change notifications.
pub struct DeviceListRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> DeviceListRepository<'a> {
    /// Create a new device list repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Record that `user_id`'s device list changed.
    pub async fn store_change(&self, user_id: &UserId) -> Result<StreamPosition, DbError> {
        let result = sqlx::query("INSERT INTO device_list_changes (user_id) VALUES (?)")
            .bind(user_id.as_str())
            .execute(self.pool)
            .await?;

        Ok(to_position(result.last_insert_rowid()))
    }

    /// Users whose device lists changed within `range` and who are either
    /// `user_id` or joined to one of `rooms`.
    ///
    /// Each user appears once, at the latest position of their changes.
    pub async fn changes_in_range(
        &self,
        user_id: &UserId,
        rooms: &BTreeSet<RoomId>,
        range: PositionRange,
    ) -> Result<Vec<DeviceListUpdate>, DbError> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        let (from, to) = range.bounds();

        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT MAX(id) AS pos, user_id FROM device_list_changes WHERE id > ",
        );
        qb.push_bind(from);
        qb.push(" AND id <= ");
        qb.push_bind(to);
        qb.push(" AND (user_id = ");
        qb.push_bind(user_id.to_string());
        push_shared_room_filter(&mut qb, rooms);
        qb.push(") GROUP BY user_id ORDER BY pos ASC");

        let rows = qb
            .build_query_as::<(i64, String)>()
            .fetch_all(self.pool)
            .await?;

        rows.into_iter()
            .map(|(id, user)| {
                Ok(DeviceListUpdate {
                    position: to_position(id),
                    user_id: parse_id(TABLE, user)?,
                })
            })
            .collect()
    }
}

/// Appends ` OR user_id IN (<joined members of rooms>)` when `rooms` is non-empty.
pub(super) fn push_shared_room_filter(qb: &mut QueryBuilder<'_, Sqlite>, rooms: &BTreeSet<RoomId>) {
    if rooms.is_empty() {
        return;
    }
    qb.push(
        " OR user_id IN (SELECT user_id FROM room_memberships WHERE membership = 'join' AND room_id IN (",
    );
    let mut sep = qb.separated(", ");
    for room in rooms {
        sep.push_bind(room.to_string());
    }
    sep.push_unseparated("))");
}
