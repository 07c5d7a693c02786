//! Device list change stream.

use async_trait::async_trait;
use syncd_proto::{Category, DeviceListUpdate};

use super::provider::{PositionCursor, StreamProvider, SyncScope};
use crate::db::{Database, DbError, PositionRange};

pub struct DeviceListStreamProvider {
    cursor: PositionCursor,
    db: Database,
}

impl DeviceListStreamProvider {
    pub fn new(db: Database) -> Self {
        Self {
            cursor: PositionCursor::new(),
            db,
        }
    }
}

#[async_trait]
impl StreamProvider for DeviceListStreamProvider {
    type Change = DeviceListUpdate;

    fn category(&self) -> Category {
        Category::DeviceList
    }

    fn cursor(&self) -> &PositionCursor {
        &self.cursor
    }

    async fn delta(
        &self,
        scope: &SyncScope,
        range: PositionRange,
    ) -> Result<Vec<DeviceListUpdate>, DbError> {
        self.db
            .device_lists()
            .changes_in_range(&scope.user_id, &scope.rooms, range)
            .await
    }
}
