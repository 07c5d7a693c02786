//! Read receipt stream.

use async_trait::async_trait;
use syncd_proto::{Category, StreamReceipt};

use super::provider::{PositionCursor, StreamProvider, SyncScope};
use crate::db::{Database, DbError, PositionRange};

pub struct ReceiptStreamProvider {
    cursor: PositionCursor,
    db: Database,
}

impl ReceiptStreamProvider {
    pub fn new(db: Database) -> Self {
        Self {
            cursor: PositionCursor::new(),
            db,
        }
    }
}

#[async_trait]
impl StreamProvider for ReceiptStreamProvider {
    type Change = StreamReceipt;

    fn category(&self) -> Category {
        Category::Receipt
    }

    fn cursor(&self) -> &PositionCursor {
        &self.cursor
    }

    async fn delta(
        &self,
        scope: &SyncScope,
        range: PositionRange,
    ) -> Result<Vec<StreamReceipt>, DbError> {
        self.db.receipts().receipts_in_range(&scope.rooms, range).await
    }
}
