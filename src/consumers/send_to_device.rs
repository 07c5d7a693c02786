//! Send-to-device consumer.

use async_trait::async_trait;
use syncd_proto::{Category, DeviceId, SendToDeviceEvent, UserId};
use tracing::debug;

use super::headers::{DEVICE_ID, USER_ID};
use super::{Consumer, ConsumerContext, parse_header, topics};
use crate::bus::BusMessage;
use crate::error::ConsumerError;
use crate::notifier::ScopeKey;

pub struct SendToDeviceConsumer {
    ctx: ConsumerContext,
}

impl SendToDeviceConsumer {
    pub fn new(ctx: ConsumerContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Consumer for SendToDeviceConsumer {
    fn topic(&self) -> &'static str {
        topics::SEND_TO_DEVICE
    }

    async fn on_message(&self, msg: &BusMessage) -> Result<(), ConsumerError> {
        let user_id: UserId = parse_header(msg, USER_ID)?;
        let device_id: DeviceId = parse_header(msg, DEVICE_ID)?;
        let event: SendToDeviceEvent = msg.decode()?;

        let pos = self
            .ctx
            .db
            .send_to_device()
            .store_message(&user_id, &device_id, &event)
            .await?;
        debug!(user_id = %user_id, device_id = %device_id, position = pos.value(), "Stored send-to-device message");
        self.ctx
            .commit(Category::SendToDevice, pos, [ScopeKey::User(user_id)]);
        Ok(())
    }
}
