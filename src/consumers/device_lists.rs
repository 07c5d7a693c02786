//! Device list change consumer.

use async_trait::async_trait;
use syncd_proto::{Category, UserId};

use super::headers::USER_ID;
use super::{Consumer, ConsumerContext, parse_header, topics};
use crate::bus::BusMessage;
use crate::error::ConsumerError;

pub struct DeviceListConsumer {
    ctx: ConsumerContext,
}

impl DeviceListConsumer {
    pub fn new(ctx: ConsumerContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Consumer for DeviceListConsumer {
    fn topic(&self) -> &'static str {
        topics::DEVICE_LISTS
    }

    async fn on_message(&self, msg: &BusMessage) -> Result<(), ConsumerError> {
        let user_id: UserId = parse_header(msg, USER_ID)?;
        let pos = self.ctx.db.device_lists().store_change(&user_id).await?;
        let scopes = self.ctx.user_and_joined_rooms(&user_id).await?;
        self.ctx.commit(Category::DeviceList, pos, scopes);
        Ok(())
    }
}
