//! Per-category streams and their coordinated startup.
//!
//! [`Streams`] owns one provider per [`Category`]. At startup every provider
//! reads its high-water mark through the same [`DatabaseSnapshot`], so the
//! first token the server hands out describes a single moment in time even
//! while consumers are already writing.

mod account_data;
mod device_list;
mod invite;
mod notification_data;
mod pdu;
mod presence;
mod provider;
mod receipt;
mod send_to_device;
mod typing;

pub use account_data::AccountDataStreamProvider;
pub use device_list::DeviceListStreamProvider;
pub use invite::InviteStreamProvider;
pub use notification_data::NotificationDataStreamProvider;
pub use pdu::PduStreamProvider;
pub use presence::PresenceStreamProvider;
pub use provider::{PositionCursor, StreamProvider, SyncScope};
pub use receipt::ReceiptStreamProvider;
pub use send_to_device::SendToDeviceStreamProvider;
pub use typing::TypingStreamProvider;

use std::sync::Arc;
use syncd_proto::{Category, StreamPosition, StreamingToken};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::db::{Database, DatabaseSnapshot, DbError};
use crate::error::StartupError;
use crate::state::TypingCache;

/// All nine category streams.
pub struct Streams {
    pub pdu: PduStreamProvider,
    pub typing: TypingStreamProvider,
    pub receipt: ReceiptStreamProvider,
    pub invite: InviteStreamProvider,
    pub send_to_device: SendToDeviceStreamProvider,
    pub account_data: AccountDataStreamProvider,
    pub device_list: DeviceListStreamProvider,
    pub notification_data: NotificationDataStreamProvider,
    pub presence: PresenceStreamProvider,
}

impl Streams {
    /// Build every provider and load their positions from one snapshot.
    ///
    /// Any storage failure aborts startup.
    pub async fn new(
        db: &Database,
        typing_cache: Arc<TypingCache>,
        cancel: &CancellationToken,
    ) -> Result<Self, StartupError> {
        let streams = Self {
            pdu: PduStreamProvider::new(db.clone()),
            typing: TypingStreamProvider::new(typing_cache),
            receipt: ReceiptStreamProvider::new(db.clone()),
            invite: InviteStreamProvider::new(db.clone()),
            send_to_device: SendToDeviceStreamProvider::new(db.clone()),
            account_data: AccountDataStreamProvider::new(db.clone()),
            device_list: DeviceListStreamProvider::new(db.clone()),
            notification_data: NotificationDataStreamProvider::new(db.clone()),
            presence: PresenceStreamProvider::new(db.clone()),
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StartupError::Canceled),
            result = streams.load(db) => result?,
        }

        let latest = streams.latest();
        for category in Category::ALL {
            crate::metrics::set_stream_position(category.as_str(), latest.get(category).value());
        }
        info!(token = %latest, "Streams initialised");
        Ok(streams)
    }

    async fn load(&self, db: &Database) -> Result<(), DbError> {
        let mut snapshot = db.snapshot().await?;
        self.setup_all(&mut snapshot).await?;
        snapshot.finish().await
    }

    async fn setup_all(&self, snapshot: &mut DatabaseSnapshot) -> Result<(), DbError> {
        self.pdu.setup(snapshot).await?;
        self.typing.setup(snapshot).await?;
        self.receipt.setup(snapshot).await?;
        self.invite.setup(snapshot).await?;
        self.send_to_device.setup(snapshot).await?;
        self.account_data.setup(snapshot).await?;
        self.device_list.setup(snapshot).await?;
        self.notification_data.setup(snapshot).await?;
        self.presence.setup(snapshot).await?;
        Ok(())
    }

    /// The current token, composed from nine independent marks.
    pub fn latest(&self) -> StreamingToken {
        StreamingToken::from_positions(Category::ALL.map(|c| self.latest_position(c)))
    }

    pub fn latest_position(&self, category: Category) -> StreamPosition {
        match category {
            Category::Pdu => self.pdu.latest_position(),
            Category::Typing => self.typing.latest_position(),
            Category::Receipt => self.receipt.latest_position(),
            Category::Invite => self.invite.latest_position(),
            Category::SendToDevice => self.send_to_device.latest_position(),
            Category::AccountData => self.account_data.latest_position(),
            Category::DeviceList => self.device_list.latest_position(),
            Category::NotificationData => self.notification_data.latest_position(),
            Category::Presence => self.presence.latest_position(),
        }
    }

    /// Raise one category's mark. Returns whether it moved.
    pub fn advance(&self, category: Category, pos: StreamPosition) -> bool {
        match category {
            Category::Pdu => self.pdu.advance(pos),
            Category::Typing => self.typing.advance(pos),
            Category::Receipt => self.receipt.advance(pos),
            Category::Invite => self.invite.advance(pos),
            Category::SendToDevice => self.send_to_device.advance(pos),
            Category::AccountData => self.account_data.advance(pos),
            Category::DeviceList => self.device_list.advance(pos),
            Category::NotificationData => self.notification_data.advance(pos),
            Category::Presence => self.presence.advance(pos),
        }
    }
}
