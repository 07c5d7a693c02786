//! Room event consumer.
//!
//! Handles new timeline events and invite retirements from the room server.
//! A membership event also drives the invite stream: an invite is stored for
//! its target, and a later join, leave or ban retires it.

use async_trait::async_trait;
use syncd_proto::{Category, EventId, Membership, RoomEvent, RoomId, UserId};
use tracing::debug;

use super::headers::{EVENT_ID, OUTPUT_TYPE};
use super::{Consumer, ConsumerContext, parse_header, topics};
use crate::bus::BusMessage;
use crate::error::ConsumerError;
use crate::notifier::ScopeKey;

pub const NEW_ROOM_EVENT: &str = "new_room_event";
pub const RETIRE_INVITE_EVENT: &str = "retire_invite_event";

pub struct RoomEventConsumer {
    ctx: ConsumerContext,
}

impl RoomEventConsumer {
    pub fn new(ctx: ConsumerContext) -> Self {
        Self { ctx }
    }

    async fn on_new_event(&self, event: RoomEvent) -> Result<(), ConsumerError> {
        let stored = self.ctx.db.events().store_event(&event).await?;
        if !stored.inserted {
            debug!(event_id = %event.event_id, position = stored.position.value(), "Ignoring redelivered room event");
            return Ok(());
        }
        let membership = event.membership();

        let mut scopes = vec![ScopeKey::Room(event.room_id.clone())];
        if let Some((target, _)) = &membership {
            scopes.push(ScopeKey::User(target.clone()));
        }
        debug!(event_id = %event.event_id, room_id = %event.room_id, position = stored.position.value(), "Stored room event");
        self.ctx.commit(Category::Pdu, stored.position, scopes);

        match membership {
            Some((target, Membership::Invite)) => {
                if let Some(pos) = self.ctx.db.invites().store_invite(&target, &event).await? {
                    self.ctx
                        .commit(Category::Invite, pos, [ScopeKey::User(target)]);
                }
            }
            Some((target, Membership::Join | Membership::Leave | Membership::Ban)) => {
                self.retire_pending(&event.room_id, &target).await?;
            }
            _ => {}
        }
        Ok(())
    }

    async fn retire_pending(&self, room_id: &RoomId, target: &UserId) -> Result<(), ConsumerError> {
        if let Some(event_id) = self.ctx.db.invites().pending_invite(room_id, target).await? {
            self.retire(&event_id).await?;
        }
        Ok(())
    }

    async fn retire(&self, event_id: &EventId) -> Result<(), ConsumerError> {
        match self.ctx.db.invites().retire_invite(event_id).await? {
            Some((target, pos)) => {
                debug!(event_id = %event_id, user_id = %target, position = pos.value(), "Retired invite");
                self.ctx
                    .commit(Category::Invite, pos, [ScopeKey::User(target)]);
            }
            None => debug!(event_id = %event_id, "No outstanding invite to retire"),
        }
        Ok(())
    }
}

#[async_trait]
impl Consumer for RoomEventConsumer {
    fn topic(&self) -> &'static str {
        topics::ROOM_EVENTS
    }

    async fn on_message(&self, msg: &BusMessage) -> Result<(), ConsumerError> {
        match msg.require_header(OUTPUT_TYPE)? {
            NEW_ROOM_EVENT => self.on_new_event(msg.decode()?).await,
            RETIRE_INVITE_EVENT => {
                let event_id: EventId = parse_header(msg, EVENT_ID)?;
                self.retire(&event_id).await
            }
            other => {
                debug!(output_type = other, "Ignoring room output type");
                Ok(())
            }
        }
    }
}
