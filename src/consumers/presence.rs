//! Presence consumer.

use async_trait::async_trait;
use syncd_proto::{Category, Presence, UserId};
use tracing::debug;

use super::headers::USER_ID;
use super::{Consumer, ConsumerContext, parse_header, topics};
use crate::bus::BusMessage;
use crate::error::ConsumerError;

pub struct PresenceConsumer {
    ctx: ConsumerContext,
}

impl PresenceConsumer {
    pub fn new(ctx: ConsumerContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Consumer for PresenceConsumer {
    fn topic(&self) -> &'static str {
        topics::PRESENCE
    }

    async fn on_message(&self, msg: &BusMessage) -> Result<(), ConsumerError> {
        let user_id: UserId = parse_header(msg, USER_ID)?;
        let presence: Presence = parse_header(msg, "presence")?;
        let last_active_ts: u64 = parse_header(msg, "last_active_ts")?;
        let status_msg = msg.header("status_msg").filter(|s| !s.is_empty());

        let Some(pos) = self
            .ctx
            .db
            .presence()
            .store_presence(&user_id, presence, status_msg, last_active_ts)
            .await?
        else {
            debug!(user_id = %user_id, presence = %presence, "Ignoring stale or repeated presence");
            return Ok(());
        };
        debug!(user_id = %user_id, presence = %presence, position = pos.value(), "Stored presence");

        let scopes = self.ctx.user_and_joined_rooms(&user_id).await?;
        self.ctx.commit(Category::Presence, pos, scopes);
        Ok(())
    }
}
