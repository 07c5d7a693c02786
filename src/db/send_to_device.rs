//! Send-to-device repository.

use super::{DbError, PositionRange, bind_position, from_json, to_json, to_position};
use sqlx::SqlitePool;
use syncd_proto::{DeviceId, SendToDeviceEvent, StreamPosition, StreamSendToDevice, UserId};

const TABLE: &str = "send_to_device";

/// Repository for device-addressed messages.
pub struct SendToDeviceRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SendToDeviceRepository<'a> {
    /// Create a new send-to-device repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Queue a message for one device.
    pub async fn store_message(
        &self,
        user_id: &UserId,
        device_id: &DeviceId,
        event: &SendToDeviceEvent,
    ) -> Result<StreamPosition, DbError> {
        let content = to_json(event)?;
        let result = sqlx::query(
            "INSERT INTO send_to_device (user_id, device_id, content) VALUES (?, ?, ?)",
        )
        .bind(user_id.as_str())
        .bind(device_id.as_str())
        .bind(&content)
        .execute(self.pool)
        .await?;

        Ok(to_position(result.last_insert_rowid()))
    }

    /// Messages for one device within `range`, in position order.
    pub async fn messages_in_range(
        &self,
        user_id: &UserId,
        device_id: &DeviceId,
        range: PositionRange,
    ) -> Result<Vec<StreamSendToDevice>, DbError> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        let (from, to) = range.bounds();
        let rows: Vec<(i64, String)> = sqlx::query_as(
            r#"
            SELECT id, content FROM send_to_device
            WHERE user_id = ? AND device_id = ? AND id > ? AND id <= ?
            ORDER BY id ASC
            "#,
        )
        .bind(user_id.as_str())
        .bind(device_id.as_str())
        .bind(from)
        .bind(to)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, content)| {
                Ok(StreamSendToDevice {
                    position: to_position(id),
                    user_id: user_id.clone(),
                    device_id: device_id.clone(),
                    event: from_json(TABLE, &content)?,
                })
            })
            .collect()
    }

    /// Delete messages the device has acknowledged, up to and including `upto`.
    pub async fn clean_up_to(
        &self,
        user_id: &UserId,
        device_id: &DeviceId,
        upto: StreamPosition,
    ) -> Result<u64, DbError> {
        let result = sqlx::query(
            "DELETE FROM send_to_device WHERE user_id = ? AND device_id = ? AND id <= ?",
        )
        .bind(user_id.as_str())
        .bind(device_id.as_str())
        .bind(bind_position(upto))
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
