//! Read receipt consumer.

use async_trait::async_trait;
use syncd_proto::{Category, Receipt};
use tracing::debug;

use super::headers::{EVENT_ID, ROOM_ID, USER_ID};
use super::{Consumer, ConsumerContext, parse_header, topics};
use crate::bus::BusMessage;
use crate::error::ConsumerError;
use crate::notifier::ScopeKey;

pub struct ReceiptConsumer {
    ctx: ConsumerContext,
}

impl ReceiptConsumer {
    pub fn new(ctx: ConsumerContext) -> Self {
        Self { ctx }
    }
}

fn parse(msg: &BusMessage) -> Result<Receipt, ConsumerError> {
    Ok(Receipt {
        room_id: parse_header(msg, ROOM_ID)?,
        receipt_type: msg.require_header("type")?.to_string(),
        user_id: parse_header(msg, USER_ID)?,
        event_id: parse_header(msg, EVENT_ID)?,
        ts: parse_header(msg, "timestamp")?,
    })
}

#[async_trait]
impl Consumer for ReceiptConsumer {
    fn topic(&self) -> &'static str {
        topics::RECEIPTS
    }

    async fn on_message(&self, msg: &BusMessage) -> Result<(), ConsumerError> {
        let receipt = parse(msg)?;
        let Some(pos) = self.ctx.db.receipts().store_receipt(&receipt).await? else {
            debug!(room_id = %receipt.room_id, user_id = %receipt.user_id, "Ignoring stale or repeated receipt");
            return Ok(());
        };
        debug!(room_id = %receipt.room_id, position = pos.value(), "Stored receipt");
        self.ctx
            .commit(Category::Receipt, pos, [ScopeKey::Room(receipt.room_id)]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumers::test_support::context;
    use syncd_proto::{RoomId, StreamPosition};

    fn receipt_message(timestamp: &str) -> BusMessage {
        receipt_for("$e:test", timestamp)
    }

    fn receipt_for(event_id: &str, timestamp: &str) -> BusMessage {
        BusMessage::new(Vec::new())
            .with_header(USER_ID, "@alice:test")
            .with_header(ROOM_ID, "!r:test")
            .with_header(EVENT_ID, event_id)
            .with_header("type", "m.read")
            .with_header("timestamp", timestamp)
    }

    #[tokio::test]
    async fn receipt_advances_and_announces() {
        let ctx = context().await;
        let consumer = ReceiptConsumer::new(ctx.clone());
        consumer.on_message(&receipt_message("1700000000000")).await.unwrap();

        assert_eq!(ctx.streams.latest().receipt, StreamPosition::new(1));
        let token = ctx
            .notifier
            .scope_token(&ScopeKey::Room(RoomId::parse("!r:test").unwrap()))
            .unwrap();
        assert_eq!(token.receipt, StreamPosition::new(1));
    }

    #[tokio::test]
    async fn bad_timestamp_changes_nothing() {
        let ctx = context().await;
        let consumer = ReceiptConsumer::new(ctx.clone());
        let err = consumer
            .on_message(&receipt_message("yesterday"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConsumerError::Malformed(_)));
        assert_eq!(ctx.streams.latest().receipt, StreamPosition::ZERO);
        assert_eq!(ctx.notifier.scope_count(), 0);
    }

    #[tokio::test]
    async fn redelivered_and_stale_receipts_change_nothing() {
        let ctx = context().await;
        let consumer = ReceiptConsumer::new(ctx.clone());
        let room = ScopeKey::Room(RoomId::parse("!r:test").unwrap());

        consumer.on_message(&receipt_for("$a:test", "1000")).await.unwrap();
        consumer.on_message(&receipt_for("$a:test", "1000")).await.unwrap();
        assert_eq!(ctx.streams.latest().receipt, StreamPosition::new(1));

        consumer.on_message(&receipt_for("$b:test", "2000")).await.unwrap();
        let latest = ctx.streams.latest();
        let room_token = ctx.notifier.scope_token(&room).unwrap();
        assert_eq!(latest.receipt, StreamPosition::new(2));

        // The older receipt arriving late must not replace the newer one.
        consumer.on_message(&receipt_for("$a:test", "1000")).await.unwrap();
        assert_eq!(ctx.streams.latest(), latest);
        assert_eq!(ctx.notifier.scope_token(&room).unwrap(), room_token);

        let rooms = std::collections::BTreeSet::from([RoomId::parse("!r:test").unwrap()]);
        let stored = ctx
            .db
            .receipts()
            .receipts_in_range(
                &rooms,
                crate::db::PositionRange::new(StreamPosition::ZERO, latest.receipt),
            )
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].receipt.event_id.as_str(), "$b:test");
    }
}
