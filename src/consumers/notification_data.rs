//! Unread notification count consumer.

use async_trait::async_trait;
use syncd_proto::{Category, NotificationData, RoomId, UserId};

use super::headers::{ROOM_ID, USER_ID};
use super::{Consumer, ConsumerContext, parse_header, topics};
use crate::bus::BusMessage;
use crate::error::ConsumerError;
use crate::notifier::ScopeKey;

pub struct NotificationDataConsumer {
    ctx: ConsumerContext,
}

impl NotificationDataConsumer {
    pub fn new(ctx: ConsumerContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Consumer for NotificationDataConsumer {
    fn topic(&self) -> &'static str {
        topics::NOTIFICATION_DATA
    }

    async fn on_message(&self, msg: &BusMessage) -> Result<(), ConsumerError> {
        let user_id: UserId = parse_header(msg, USER_ID)?;
        let room_id: RoomId = parse_header(msg, ROOM_ID)?;
        let counts: NotificationData = msg.decode()?;

        let pos = self
            .ctx
            .db
            .notification_data()
            .store_counts(&user_id, &room_id, counts)
            .await?;
        self.ctx
            .commit(Category::NotificationData, pos, [ScopeKey::User(user_id)]);
        Ok(())
    }
}
