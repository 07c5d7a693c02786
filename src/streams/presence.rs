//! Presence stream.

use async_trait::async_trait;
use syncd_proto::{Category, PresenceUpdate};

use super::provider::{PositionCursor, StreamProvider, SyncScope};
use crate::db::{Database, DbError, PositionRange};

pub struct PresenceStreamProvider {
    cursor: PositionCursor,
    db: Database,
}

impl PresenceStreamProvider {
    pub fn new(db: Database) -> Self {
        Self {
            cursor: PositionCursor::new(),
            db,
        }
    }
}

#[async_trait]
impl StreamProvider for PresenceStreamProvider {
    type Change = PresenceUpdate;

    fn category(&self) -> Category {
        Category::Presence
    }

    fn cursor(&self) -> &PositionCursor {
        &self.cursor
    }

    async fn delta(
        &self,
        scope: &SyncScope,
        range: PositionRange,
    ) -> Result<Vec<PresenceUpdate>, DbError> {
        self.db
            .presence()
            .presence_in_range(&scope.user_id, &scope.rooms, range)
            .await
    }
}
