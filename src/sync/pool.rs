//! The sync request driver.

use std::collections::BTreeSet;
use std::sync::Arc;
use syncd_proto::{Category, DeviceId, StreamPosition, StreamingToken};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, warn};

use super::{SyncRequest, SyncResponse};
use crate::config::SyncConfig;
use crate::db::{Database, PositionRange};
use crate::error::SyncError;
use crate::notifier::{Notifier, WaitOutcome};
use crate::streams::{StreamProvider, Streams, SyncScope};
use crate::telemetry::{SyncTimer, spans};

/// Serves long-poll sync requests against the shared streams and notifier.
///
/// Cheap to share: all state lives behind the `Arc`s it holds.
pub struct RequestPool {
    db: Database,
    streams: Arc<Streams>,
    notifier: Arc<Notifier>,
    config: SyncConfig,
}

impl RequestPool {
    pub fn new(
        db: Database,
        streams: Arc<Streams>,
        notifier: Arc<Notifier>,
        config: SyncConfig,
    ) -> Self {
        Self {
            db,
            streams,
            notifier,
            config,
        }
    }

    /// Answer one sync request.
    ///
    /// Returns as soon as anything relevant is newer than the since token, or
    /// an empty response carrying the current token once the timeout passes.
    /// Requests without a since token, or with a zero timeout, never block.
    pub async fn on_incoming_sync_request(
        &self,
        req: SyncRequest,
        cancel: &CancellationToken,
    ) -> Result<SyncResponse, SyncError> {
        let _timer = SyncTimer::start();
        let span = spans::sync_request(
            req.user_id.as_str(),
            req.device_id.as_ref().map(DeviceId::as_str),
            req.since.as_deref().unwrap_or(""),
        );

        let result = self.sync(req, cancel).instrument(span).await;
        if let Err(e) = &result {
            crate::metrics::record_sync_error(e.error_code());
        }
        result
    }

    async fn sync(
        &self,
        req: SyncRequest,
        cancel: &CancellationToken,
    ) -> Result<SyncResponse, SyncError> {
        let timeout = self.config.effective_timeout(req.timeout_ms);
        let deadline = Instant::now() + timeout;
        let initial = req.since.is_none();

        let mut since = match req.since.as_deref() {
            Some(raw) => self.clamp_to_latest(raw.parse()?),
            None => StreamingToken::default(),
        };

        if let Some(device_id) = &req.device_id
            && !since.send_to_device.is_zero()
        {
            let removed = self
                .db
                .send_to_device()
                .clean_up_to(&req.user_id, device_id, since.send_to_device)
                .await?;
            if removed > 0 {
                debug!(removed, "Cleaned up acknowledged send-to-device messages");
            }
        }

        loop {
            let rooms: BTreeSet<_> = self
                .db
                .events()
                .joined_rooms(&req.user_id)
                .await?
                .into_iter()
                .collect();
            let to = self.streams.latest();
            let scope = SyncScope {
                user_id: req.user_id.clone(),
                device_id: req.device_id.clone(),
                rooms,
                timeline_limit: self.config.timeline_limit,
            };

            let response = self.collect(&scope, &since, to).await?;
            if !response.is_empty() || initial || timeout.is_zero() {
                debug!(next_batch = %to, changes = response.change_count(), "Sync complete");
                return Ok(response);
            }

            // Nothing visible up to `to`; wait for anything past it.
            match self
                .notifier
                .wait(&scope.rooms, &scope.user_id, &to, deadline, cancel)
                .await
            {
                WaitOutcome::Woken(_) => since = to,
                WaitOutcome::TimedOut => {
                    debug!(next_batch = %to, "Sync timed out");
                    return Ok(SyncResponse::empty(to));
                }
                WaitOutcome::Canceled => return Err(SyncError::Canceled),
            }
        }
    }

    /// Reset categories the client claims to be ahead in.
    ///
    /// Happens after a restart for the non-durable typing stream, or with a
    /// token from another server. Such categories restart from zero.
    fn clamp_to_latest(&self, mut since: StreamingToken) -> StreamingToken {
        let latest = self.streams.latest();
        for category in Category::ALL {
            if since.get(category) > latest.get(category) {
                warn!(
                    category = category.as_str(),
                    since = since.get(category).value(),
                    latest = latest.get(category).value(),
                    "Since position ahead of stream, resetting"
                );
                since.set(category, StreamPosition::ZERO);
            }
        }
        since
    }

    async fn collect(
        &self,
        scope: &SyncScope,
        since: &StreamingToken,
        to: StreamingToken,
    ) -> Result<SyncResponse, SyncError> {
        let range = |category: Category| PositionRange::new(since.get(category), to.get(category));
        let s = &self.streams;

        let (
            timeline,
            typing,
            receipts,
            invites,
            to_device,
            account_data,
            device_lists,
            notification_counts,
            presence,
        ) = tokio::try_join!(
            s.pdu.delta(scope, range(Category::Pdu)),
            s.typing.delta(scope, range(Category::Typing)),
            s.receipt.delta(scope, range(Category::Receipt)),
            s.invite.delta(scope, range(Category::Invite)),
            s.send_to_device.delta(scope, range(Category::SendToDevice)),
            s.account_data.delta(scope, range(Category::AccountData)),
            s.device_list.delta(scope, range(Category::DeviceList)),
            s.notification_data.delta(scope, range(Category::NotificationData)),
            s.presence.delta(scope, range(Category::Presence)),
        )?;

        let now_ms = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default();
        Ok(SyncResponse {
            next_batch: to,
            timeline,
            typing,
            receipts,
            invites,
            to_device,
            account_data,
            device_lists,
            notification_counts,
            presence: presence.iter().map(|p| p.to_content(now_ms)).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TypingCache;
    use std::time::Duration;
    use syncd_proto::{Receipt, RoomEvent, RoomId, UserId};

    async fn pool() -> (RequestPool, Database, Arc<Streams>, Arc<Notifier>) {
        let db = Database::new(":memory:").await.unwrap();
        let streams = Arc::new(
            Streams::new(&db, Arc::new(TypingCache::new()), &CancellationToken::new())
                .await
                .unwrap(),
        );
        let notifier = Arc::new(Notifier::new());
        let pool = RequestPool::new(
            db.clone(),
            Arc::clone(&streams),
            Arc::clone(&notifier),
            SyncConfig::default(),
        );
        (pool, db, streams, notifier)
    }

    fn alice() -> UserId {
        UserId::parse("@alice:test").unwrap()
    }

    async fn join(db: &Database, streams: &Streams, room: &str, user: &str) {
        let stored = db
            .events()
            .store_event(&RoomEvent {
                event_id: syncd_proto::EventId::parse(format!("$join-{user}-{room}")).unwrap(),
                room_id: RoomId::parse(room).unwrap(),
                sender: UserId::parse(user).unwrap(),
                event_type: "m.room.member".into(),
                state_key: Some(user.into()),
                content: serde_json::json!({ "membership": "join" }),
                origin_server_ts: 0,
            })
            .await
            .unwrap();
        streams.advance(Category::Pdu, stored.position);
    }

    #[tokio::test]
    async fn initial_sync_returns_immediately() {
        let (pool, db, streams, _) = pool().await;
        join(&db, &streams, "!r:test", "@alice:test").await;

        let resp = pool
            .on_incoming_sync_request(SyncRequest::new(alice()), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(resp.next_batch, streams.latest());
        assert_eq!(resp.timeline.len(), 1);
    }

    #[tokio::test]
    async fn zero_timeout_returns_empty_without_waiting() {
        let (pool, _, _, notifier) = pool().await;
        let resp = pool
            .on_incoming_sync_request(
                SyncRequest::new(alice())
                    .with_since("s0_0_0")
                    .with_timeout_ms(0),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(resp.is_empty());
        assert_eq!(notifier.scope_count(), 0);
    }

    #[tokio::test]
    async fn invalid_since_is_rejected() {
        let (pool, _, _, _) = pool().await;
        let err = pool
            .on_incoming_sync_request(
                SyncRequest::new(alice()).with_since("not-a-token"),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn ahead_of_latest_resets_to_zero() {
        let (pool, db, streams, _) = pool().await;
        join(&db, &streams, "!r:test", "@alice:test").await;

        // Typing at 99 cannot exist in a fresh process.
        let resp = pool
            .on_incoming_sync_request(
                SyncRequest::new(alice())
                    .with_since("s0_99")
                    .with_timeout_ms(0),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(resp.timeline.len(), 1);
        assert_eq!(resp.next_batch.typing, StreamPosition::ZERO);
    }

    #[tokio::test]
    async fn blocked_request_wakes_on_receipt() {
        let (pool, db, streams, notifier) = pool().await;
        join(&db, &streams, "!r:test", "@alice:test").await;
        let since = streams.latest().to_string();
        let pool = Arc::new(pool);

        let request = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move {
                pool.on_incoming_sync_request(
                    SyncRequest::new(alice())
                        .with_since(since)
                        .with_timeout_ms(10_000),
                    &CancellationToken::new(),
                )
                .await
            })
        };
        while notifier.active_waiters() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let receipt = Receipt {
            room_id: RoomId::parse("!r:test").unwrap(),
            receipt_type: "m.read".into(),
            user_id: UserId::parse("@bob:test").unwrap(),
            event_id: syncd_proto::EventId::parse("$e:test").unwrap(),
            ts: 1,
        };
        let pos = db.receipts().store_receipt(&receipt).await.unwrap().unwrap();
        streams.advance(Category::Receipt, pos);
        notifier.announce(
            [crate::notifier::ScopeKey::Room(receipt.room_id.clone())],
            Category::Receipt,
            pos,
        );

        let resp = request.await.unwrap().unwrap();
        assert_eq!(resp.receipts.len(), 1);
        assert_eq!(resp.receipts[0].receipt, receipt);
        assert_eq!(resp.next_batch.receipt, pos);
    }

    #[tokio::test]
    async fn canceled_request_errors() {
        let (pool, _, _, notifier) = pool().await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = pool
            .on_incoming_sync_request(SyncRequest::new(alice()).with_since("s0"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Canceled));
        assert_eq!(notifier.active_waiters(), 0);
    }
}
