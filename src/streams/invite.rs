//! Invite stream.

use async_trait::async_trait;
use syncd_proto::{Category, StreamInvite};

use super::provider::{PositionCursor, StreamProvider, SyncScope};
use crate::db::{Database, DbError, PositionRange};

pub struct InviteStreamProvider {
    cursor: PositionCursor,
    db: Database,
}

impl InviteStreamProvider {
    pub fn new(db: Database) -> Self {
        Self {
            cursor: PositionCursor::new(),
            db,
        }
    }
}

#[async_trait]
impl StreamProvider for InviteStreamProvider {
    type Change = StreamInvite;

    fn category(&self) -> Category {
        Category::Invite
    }

    fn cursor(&self) -> &PositionCursor {
        &self.cursor
    }

    async fn delta(
        &self,
        scope: &SyncScope,
        range: PositionRange,
    ) -> Result<Vec<StreamInvite>, DbError> {
        self.db.invites().invites_in_range(&scope.user_id, range).await
    }
}
