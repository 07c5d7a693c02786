//! Account data stream.

use async_trait::async_trait;
use syncd_proto::{Category, StreamAccountData};

use super::provider::{PositionCursor, StreamProvider, SyncScope};
use crate::db::{Database, DbError, PositionRange};

pub struct AccountDataStreamProvider {
    cursor: PositionCursor,
    db: Database,
}

impl AccountDataStreamProvider {
    pub fn new(db: Database) -> Self {
        Self {
            cursor: PositionCursor::new(),
            db,
        }
    }
}

#[async_trait]
impl StreamProvider for AccountDataStreamProvider {
    type Change = StreamAccountData;

    fn category(&self) -> Category {
        Category::AccountData
    }

    fn cursor(&self) -> &PositionCursor {
        &self.cursor
    }

    async fn delta(
        &self,
        scope: &SyncScope,
        range: PositionRange,
    ) -> Result<Vec<StreamAccountData>, DbError> {
        self.db
            .account_data()
            .account_data_in_range(&scope.user_id, range)
            .await
    }
}
