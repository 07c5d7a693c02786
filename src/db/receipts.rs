//! Read receipt repository.

use super::{DbError, PositionRange, parse_id, to_position};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::BTreeSet;
use syncd_proto::{Receipt, RoomId, StreamPosition, StreamReceipt};

const TABLE: &str = "receipts";

/// Repository for read receipts.
pub struct ReceiptRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ReceiptRepository<'a> {
    /// Create a new receipt repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a receipt, replacing the user's previous receipt of the same
    /// type in the room under a fresh position.
    ///
    /// Returns `None` without writing when the stored receipt is newer, or is
    /// the same receipt delivered again.
    pub async fn store_receipt(&self, receipt: &Receipt) -> Result<Option<StreamPosition>, DbError> {
        let ts = i64::try_from(receipt.ts).unwrap_or(i64::MAX);
        let result = sqlx::query(
            r#"
            INSERT OR REPLACE INTO receipts (room_id, receipt_type, user_id, event_id, receipt_ts)
            SELECT ?, ?, ?, ?, ?
            WHERE NOT EXISTS (
                SELECT 1 FROM receipts
                WHERE room_id = ? AND receipt_type = ? AND user_id = ?
                  AND (receipt_ts > ? OR (receipt_ts = ? AND event_id = ?))
            )
            "#,
        )
        .bind(receipt.room_id.as_str())
        .bind(&receipt.receipt_type)
        .bind(receipt.user_id.as_str())
        .bind(receipt.event_id.as_str())
        .bind(ts)
        .bind(receipt.room_id.as_str())
        .bind(&receipt.receipt_type)
        .bind(receipt.user_id.as_str())
        .bind(ts)
        .bind(ts)
        .bind(receipt.event_id.as_str())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(to_position(result.last_insert_rowid())))
    }

    /// Receipts in `rooms` stored within `range`, in position order.
    pub async fn receipts_in_range(
        &self,
        rooms: &BTreeSet<RoomId>,
        range: PositionRange,
    ) -> Result<Vec<StreamReceipt>, DbError> {
        if range.is_empty() || rooms.is_empty() {
            return Ok(Vec::new());
        }
        let (from, to) = range.bounds();

        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT id, room_id, receipt_type, user_id, event_id, receipt_ts FROM receipts WHERE id > ",
        );
        qb.push_bind(from);
        qb.push(" AND id <= ");
        qb.push_bind(to);
        qb.push(" AND room_id IN (");
        let mut sep = qb.separated(", ");
        for room in rooms {
            sep.push_bind(room.to_string());
        }
        sep.push_unseparated(") ORDER BY id ASC");

        let rows = qb
            .build_query_as::<(i64, String, String, String, String, i64)>()
            .fetch_all(self.pool)
            .await?;

        rows.into_iter()
            .map(|(id, room_id, receipt_type, user_id, event_id, ts)| {
                Ok(StreamReceipt {
                    position: to_position(id),
                    receipt: Receipt {
                        room_id: parse_id(TABLE, room_id)?,
                        receipt_type,
                        user_id: parse_id(TABLE, user_id)?,
                        event_id: parse_id(TABLE, event_id)?,
                        ts: u64::try_from(ts).unwrap_or_default(),
                    },
                })
            })
            .collect()
    }
}
