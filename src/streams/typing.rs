//! Typing stream, served from the in-memory cache.

use async_trait::async_trait;
use std::sync::Arc;
use syncd_proto::{Category, TypingNotice};

use super::provider::{PositionCursor, StreamProvider, SyncScope};
use crate::db::{DatabaseSnapshot, DbError, PositionRange};
use crate::state::TypingCache;

pub struct TypingStreamProvider {
    cursor: PositionCursor,
    cache: Arc<TypingCache>,
}

impl TypingStreamProvider {
    pub fn new(cache: Arc<TypingCache>) -> Self {
        Self {
            cursor: PositionCursor::new(),
            cache,
        }
    }

    pub fn cache(&self) -> &Arc<TypingCache> {
        &self.cache
    }
}

#[async_trait]
impl StreamProvider for TypingStreamProvider {
    type Change = TypingNotice;

    fn category(&self) -> Category {
        Category::Typing
    }

    fn cursor(&self) -> &PositionCursor {
        &self.cursor
    }

    /// Typing is not stored, so the mark comes from the cache.
    async fn setup(&self, _snapshot: &mut DatabaseSnapshot) -> Result<(), DbError> {
        self.cursor.advance(self.cache.latest_position());
        Ok(())
    }

    async fn delta(
        &self,
        scope: &SyncScope,
        range: PositionRange,
    ) -> Result<Vec<TypingNotice>, DbError> {
        Ok(self.cache.notices_in_range(&scope.rooms, range))
    }
}
