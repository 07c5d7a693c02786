//! Room timeline stream.

use async_trait::async_trait;
use std::collections::BTreeSet;
use syncd_proto::{Category, TimelineChunk};

use super::provider::{PositionCursor, StreamProvider, SyncScope};
use crate::db::{Database, DbError, PositionRange};

pub struct PduStreamProvider {
    cursor: PositionCursor,
    db: Database,
}

impl PduStreamProvider {
    pub fn new(db: Database) -> Self {
        Self {
            cursor: PositionCursor::new(),
            db,
        }
    }
}

#[async_trait]
impl StreamProvider for PduStreamProvider {
    type Change = TimelineChunk;

    fn category(&self) -> Category {
        Category::Pdu
    }

    fn cursor(&self) -> &PositionCursor {
        &self.cursor
    }

    async fn delta(
        &self,
        scope: &SyncScope,
        range: PositionRange,
    ) -> Result<Vec<TimelineChunk>, DbError> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        let events = self.db.events();
        // Rooms the user just left are no longer joined but still owe them the leave.
        let mut rooms: BTreeSet<_> = events
            .membership_changes(&scope.user_id, range)
            .await?
            .into_iter()
            .collect();
        rooms.extend(scope.rooms.iter().cloned());

        events.timeline(&rooms, range, scope.timeline_limit).await
    }
}
