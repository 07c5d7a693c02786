//! The capability every category stream implements.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use syncd_proto::{Category, DeviceId, RoomId, StreamPosition, UserId};

use crate::db::{DatabaseSnapshot, DbError, PositionRange};

/// In-memory high-water mark of one category.
///
/// Only ever moves forward. Readers never block writers.
#[derive(Debug, Default)]
pub struct PositionCursor(AtomicU64);

impl PositionCursor {
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn get(&self) -> StreamPosition {
        StreamPosition::new(self.0.load(Ordering::Acquire))
    }

    /// Raise the mark to `pos`. Returns whether it moved.
    pub fn advance(&self, pos: StreamPosition) -> bool {
        self.0.fetch_max(pos.value(), Ordering::AcqRel) < pos.value()
    }
}

/// Who a delta is computed for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncScope {
    pub user_id: UserId,
    /// Requesting device; send-to-device messages need one.
    pub device_id: Option<DeviceId>,
    /// Rooms the user is joined to.
    pub rooms: BTreeSet<RoomId>,
    /// Newest timeline events returned per room.
    pub timeline_limit: usize,
}

impl SyncScope {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            device_id: None,
            rooms: BTreeSet::new(),
            timeline_limit: crate::config::SyncConfig::default().timeline_limit,
        }
    }

    pub fn with_device(mut self, device_id: DeviceId) -> Self {
        self.device_id = Some(device_id);
        self
    }

    pub fn with_rooms(mut self, rooms: impl IntoIterator<Item = RoomId>) -> Self {
        self.rooms = rooms.into_iter().collect();
        self
    }
}

/// One synchronizable category.
///
/// Implementors embed a [`PositionCursor`] and whatever read access they need
/// to answer [`delta`](StreamProvider::delta). The cursor is raised only by
/// [`setup`](StreamProvider::setup) and [`advance`](StreamProvider::advance);
/// a failing delta never moves it.
#[async_trait]
pub trait StreamProvider: Send + Sync {
    /// One change reported to a client.
    type Change: Send;

    fn category(&self) -> Category;

    fn cursor(&self) -> &PositionCursor;

    /// Load the durable high-water mark from `snapshot`.
    async fn setup(&self, snapshot: &mut DatabaseSnapshot) -> Result<(), DbError> {
        let pos = snapshot.max_position(self.category()).await?;
        self.cursor().advance(pos);
        Ok(())
    }

    /// Current high-water mark. Never blocks.
    fn latest_position(&self) -> StreamPosition {
        self.cursor().get()
    }

    /// Raise the high-water mark. Duplicate and out-of-order calls are harmless.
    fn advance(&self, pos: StreamPosition) -> bool {
        let moved = self.cursor().advance(pos);
        if moved {
            crate::metrics::set_stream_position(self.category().as_str(), pos.value());
        }
        moved
    }

    /// Changes visible to `scope` within `range`, in position order.
    async fn delta(
        &self,
        scope: &SyncScope,
        range: PositionRange,
    ) -> Result<Vec<Self::Change>, DbError>;
}
