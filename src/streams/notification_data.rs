//! Unread notification count stream.

use async_trait::async_trait;
use syncd_proto::{Category, StreamNotificationData};

use super::provider::{PositionCursor, StreamProvider, SyncScope};
use crate::db::{Database, DbError, PositionRange};

pub struct NotificationDataStreamProvider {
    cursor: PositionCursor,
    db: Database,
}

impl NotificationDataStreamProvider {
    pub fn new(db: Database) -> Self {
        Self {
            cursor: PositionCursor::new(),
            db,
        }
    }
}

#[async_trait]
impl StreamProvider for NotificationDataStreamProvider {
    type Change = StreamNotificationData;

    fn category(&self) -> Category {
        Category::NotificationData
    }

    fn cursor(&self) -> &PositionCursor {
        &self.cursor
    }

    async fn delta(
        &self,
        scope: &SyncScope,
        range: PositionRange,
    ) -> Result<Vec<StreamNotificationData>, DbError> {
        self.db
            .notification_data()
            .counts_in_range(&scope.user_id, range)
            .await
    }
}
