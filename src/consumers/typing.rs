//! Typing consumer and expiry sweeper.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use syncd_proto::{Category, RoomId, UserId};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::headers::{ROOM_ID, USER_ID};
use super::{Consumer, ConsumerContext, parse_header, topics};
use crate::bus::BusMessage;
use crate::error::ConsumerError;
use crate::notifier::ScopeKey;
use crate::state::TypingCache;

pub struct TypingConsumer {
    ctx: ConsumerContext,
    cache: Arc<TypingCache>,
    default_timeout: Duration,
}

impl TypingConsumer {
    pub fn new(ctx: ConsumerContext, cache: Arc<TypingCache>, default_timeout: Duration) -> Self {
        Self {
            ctx,
            cache,
            default_timeout,
        }
    }
}

#[async_trait]
impl Consumer for TypingConsumer {
    fn topic(&self) -> &'static str {
        topics::TYPING
    }

    async fn on_message(&self, msg: &BusMessage) -> Result<(), ConsumerError> {
        let room_id: RoomId = parse_header(msg, ROOM_ID)?;
        let user_id: UserId = parse_header(msg, USER_ID)?;
        let typing: bool = parse_header(msg, "typing")?;

        let pos = if typing {
            let timeout = match msg.header("timeout_ms") {
                Some(_) => Duration::from_millis(parse_header(msg, "timeout_ms")?),
                None => self.default_timeout,
            };
            Some(self.cache.add(&room_id, &user_id, timeout))
        } else {
            self.cache.remove(&room_id, &user_id)
        };

        if let Some(pos) = pos {
            debug!(room_id = %room_id, user_id = %user_id, typing, position = pos.value(), "Typing changed");
            self.ctx.commit(Category::Typing, pos, [ScopeKey::Room(room_id)]);
        }
        Ok(())
    }
}

/// Expire stale typing notices every `interval` until `cancel` fires.
pub async fn run_typing_sweeper(
    ctx: ConsumerContext,
    cache: Arc<TypingCache>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                for (room_id, pos) in cache.expire(Instant::now()) {
                    debug!(room_id = %room_id, position = pos.value(), "Typing expired");
                    ctx.commit(Category::Typing, pos, [ScopeKey::Room(room_id)]);
                }
            }
        }
    }
}
