//! Account data consumer.

use async_trait::async_trait;
use syncd_proto::{AccountData, Category};

use super::{Consumer, ConsumerContext, topics};
use crate::bus::BusMessage;
use crate::error::ConsumerError;
use crate::notifier::ScopeKey;

pub struct AccountDataConsumer {
    ctx: ConsumerContext,
}

impl AccountDataConsumer {
    pub fn new(ctx: ConsumerContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Consumer for AccountDataConsumer {
    fn topic(&self) -> &'static str {
        topics::ACCOUNT_DATA
    }

    async fn on_message(&self, msg: &BusMessage) -> Result<(), ConsumerError> {
        let data: AccountData = msg.decode()?;
        let pos = self.ctx.db.account_data().store_account_data(&data).await?;
        self.ctx
            .commit(Category::AccountData, pos, [ScopeKey::User(data.user_id)]);
        Ok(())
    }
}
