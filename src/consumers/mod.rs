//! Bus consumers: one per category topic.
//!
//! Every consumer follows the same contract: parse the message, persist it
//! (which issues the position), advance the category's stream, then announce
//! to the affected scopes. Malformed messages are logged and acknowledged
//! without touching any state. A storage failure is logged and the message
//! is skipped.

mod account_data;
mod device_lists;
mod notification_data;
mod presence;
mod receipts;
mod room_events;
mod send_to_device;
mod typing;

pub use account_data::AccountDataConsumer;
pub use device_lists::DeviceListConsumer;
pub use notification_data::NotificationDataConsumer;
pub use presence::PresenceConsumer;
pub use receipts::ReceiptConsumer;
pub use room_events::RoomEventConsumer;
pub use send_to_device::SendToDeviceConsumer;
pub use typing::{TypingConsumer, run_typing_sweeper};

use async_trait::async_trait;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use syncd_proto::{Category, StreamPosition, UserId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, warn};

use crate::bus::{BusError, BusMessage, EventBus};
use crate::db::{Database, DbError};
use crate::error::ConsumerError;
use crate::notifier::{Notifier, ScopeKey};
use crate::state::TypingCache;
use crate::streams::Streams;

/// Topic names, relative to the bus prefix.
pub mod topics {
    pub const ROOM_EVENTS: &str = "output_room_event";
    pub const TYPING: &str = "output_typing_event";
    pub const RECEIPTS: &str = "output_receipt_event";
    pub const SEND_TO_DEVICE: &str = "output_send_to_device_event";
    pub const ACCOUNT_DATA: &str = "output_client_data";
    pub const DEVICE_LISTS: &str = "output_key_change_event";
    pub const NOTIFICATION_DATA: &str = "output_notification_data";
    pub const PRESENCE: &str = "output_presence_event";
}

/// Message header names shared by producers and consumers.
pub mod headers {
    pub const USER_ID: &str = "user_id";
    pub const ROOM_ID: &str = "room_id";
    pub const EVENT_ID: &str = "event_id";
    pub const DEVICE_ID: &str = "device_id";
    pub const OUTPUT_TYPE: &str = "output_type";
}

/// Handles the messages of one topic.
#[async_trait]
pub trait Consumer: Send + Sync + 'static {
    fn topic(&self) -> &'static str;

    async fn on_message(&self, msg: &BusMessage) -> Result<(), ConsumerError>;
}

/// What every consumer needs to persist, advance and announce.
#[derive(Clone)]
pub struct ConsumerContext {
    pub db: Database,
    pub streams: Arc<Streams>,
    pub notifier: Arc<Notifier>,
}

impl ConsumerContext {
    pub fn new(db: Database, streams: Arc<Streams>, notifier: Arc<Notifier>) -> Self {
        Self {
            db,
            streams,
            notifier,
        }
    }

    /// Publish a stored change: advance first, then announce.
    pub fn commit<I>(&self, category: Category, pos: StreamPosition, scopes: I)
    where
        I: IntoIterator<Item = ScopeKey>,
    {
        self.streams.advance(category, pos);
        self.notifier.announce(scopes, category, pos);
    }

    /// `user` plus every room they are joined to.
    ///
    /// Used for changes other room members must see, such as presence.
    pub async fn user_and_joined_rooms(&self, user: &UserId) -> Result<Vec<ScopeKey>, DbError> {
        let mut scopes: Vec<ScopeKey> = self
            .db
            .events()
            .joined_rooms(user)
            .await?
            .into_iter()
            .map(ScopeKey::Room)
            .collect();
        scopes.push(ScopeKey::User(user.clone()));
        Ok(scopes)
    }
}

/// Parse a required header with [`FromStr`].
pub(crate) fn parse_header<T>(msg: &BusMessage, name: &str) -> Result<T, ConsumerError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = msg.require_header(name)?;
    raw.parse()
        .map_err(|e| ConsumerError::Malformed(format!("header {name:?}: {e}")))
}

/// Drive `consumer` until `cancel` fires or the topic closes.
pub async fn run_consumer<C: Consumer>(
    consumer: C,
    mut rx: mpsc::Receiver<BusMessage>,
    cancel: CancellationToken,
) {
    let topic = consumer.topic();
    async move {
        info!("Consumer started");
        loop {
            let msg = tokio::select! {
                _ = cancel.cancelled() => break,
                msg = rx.recv() => match msg {
                    Some(msg) => msg,
                    None => break,
                },
            };

            match consumer.on_message(&msg).await {
                Ok(()) => crate::metrics::record_consumer_message(topic, "ok"),
                Err(ConsumerError::Malformed(reason)) => {
                    warn!(message_id = %msg.id, reason = %reason, "Skipping malformed message");
                    crate::metrics::record_consumer_message(topic, "malformed");
                }
                Err(e) => {
                    error!(message_id = %msg.id, error = %e, "Failed to process message");
                    crate::metrics::record_consumer_message(topic, e.error_code());
                }
            }
        }
        info!("Consumer stopped");
    }
    .instrument(crate::telemetry::spans::consumer(topic))
    .await
}

fn spawn<C: Consumer>(
    bus: &EventBus,
    consumer: C,
    cancel: &CancellationToken,
) -> Result<JoinHandle<()>, BusError> {
    let rx = bus.subscribe(consumer.topic())?;
    Ok(tokio::spawn(run_consumer(consumer, rx, cancel.clone())))
}

/// Subscribe and spawn every consumer.
pub fn spawn_all(
    ctx: &ConsumerContext,
    bus: &EventBus,
    typing_cache: Arc<TypingCache>,
    typing_timeout: Duration,
    cancel: &CancellationToken,
) -> Result<Vec<JoinHandle<()>>, BusError> {
    Ok(vec![
        spawn(bus, RoomEventConsumer::new(ctx.clone()), cancel)?,
        spawn(
            bus,
            TypingConsumer::new(ctx.clone(), typing_cache, typing_timeout),
            cancel,
        )?,
        spawn(bus, ReceiptConsumer::new(ctx.clone()), cancel)?,
        spawn(bus, SendToDeviceConsumer::new(ctx.clone()), cancel)?,
        spawn(bus, AccountDataConsumer::new(ctx.clone()), cancel)?,
        spawn(bus, DeviceListConsumer::new(ctx.clone()), cancel)?,
        spawn(bus, NotificationDataConsumer::new(ctx.clone()), cancel)?,
        spawn(bus, PresenceConsumer::new(ctx.clone()), cancel)?,
    ])
}
