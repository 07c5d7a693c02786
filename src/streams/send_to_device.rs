//! Send-to-device stream.

use async_trait::async_trait;
use syncd_proto::{Category, StreamSendToDevice};

use super::provider::{PositionCursor, StreamProvider, SyncScope};
use crate::db::{Database, DbError, PositionRange};

pub struct SendToDeviceStreamProvider {
    cursor: PositionCursor,
    db: Database,
}

impl SendToDeviceStreamProvider {
    pub fn new(db: Database) -> Self {
        Self {
            cursor: PositionCursor::new(),
            db,
        }
    }
}

#[async_trait]
impl StreamProvider for SendToDeviceStreamProvider {
    type Change = StreamSendToDevice;

    fn category(&self) -> Category {
        Category::SendToDevice
    }

    fn cursor(&self) -> &PositionCursor {
        &self.cursor
    }

    async fn delta(
        &self,
        scope: &SyncScope,
        range: PositionRange,
    ) -> Result<Vec<StreamSendToDevice>, DbError> {
        let Some(device_id) = &scope.device_id else {
            return Ok(Vec::new());
        };
        self.db
            .send_to_device()
            .messages_in_range(&scope.user_id, device_id, range)
            .await
    }
}
