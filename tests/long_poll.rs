//! Long-poll behaviour through the full consumer and request path.

mod common;

use common::TestEngine;
use common::messages;
use std::collections::BTreeSet;
use std::time::Duration;
use syncd_ng::consumers::topics;
use syncd_ng::db::PositionRange;
use syncd_ng::error::SyncError;
use syncd_ng::notifier::{Notifier, WaitOutcome};
use syncd_ng::streams::{StreamProvider, SyncScope};
use syncd_ng::sync::SyncRequest;
use syncd_proto::{RoomId, StreamPosition, StreamingToken, UserId};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

fn user(id: &str) -> UserId {
    UserId::parse(id).unwrap()
}

fn room(id: &str) -> RoomId {
    RoomId::parse(id).unwrap()
}

/// Join `member` to `room_id` and wait until the event is visible.
async fn join(engine: &TestEngine, room_id: &str, member: &str) {
    let before = engine.streams.latest().pdu;
    engine
        .publish(
            topics::ROOM_EVENTS,
            messages::membership(&format!("$join-{member}-{room_id}"), room_id, member, "join"),
        )
        .await;
    engine.wait_for_latest(|t| t.pdu > before).await;
}

#[tokio::test]
async fn receipt_wakes_blocked_request_with_exact_delta() {
    let engine = TestEngine::spawn().await.unwrap();
    join(&engine, "!r:test", "@alice:test").await;

    // Forty-one receipts elsewhere put the stream at 41.
    for i in 0..41 {
        engine
            .publish(
                topics::RECEIPTS,
                messages::receipt("!elsewhere:test", "@carol:test", &format!("${i}:test")),
            )
            .await;
    }
    engine
        .wait_for_latest(|t| t.receipt == StreamPosition::new(41))
        .await;

    let since = engine
        .streams
        .latest()
        .with(syncd_proto::Category::Receipt, StreamPosition::new(40));
    let request = engine
        .sync_in_background(
            SyncRequest::new(user("@alice:test"))
                .with_since(since.to_string())
                .with_timeout_ms(10_000),
        )
        .await;

    engine
        .publish(
            topics::RECEIPTS,
            messages::receipt("!r:test", "@bob:test", "$target:test"),
        )
        .await;

    let resp = request.await.unwrap().unwrap();
    assert_eq!(resp.next_batch.receipt, StreamPosition::new(42));
    assert_eq!(resp.receipts.len(), 1);
    assert_eq!(resp.receipts[0].position, StreamPosition::new(42));
    assert_eq!(resp.receipts[0].receipt.room_id, room("!r:test"));

    // The provider answers the same range directly.
    let scope = SyncScope::new(user("@alice:test")).with_rooms([room("!r:test")]);
    let delta = engine
        .streams
        .receipt
        .delta(
            &scope,
            PositionRange::new(StreamPosition::new(40), StreamPosition::new(42)),
        )
        .await
        .unwrap();
    assert_eq!(delta.len(), 1);
    assert_eq!(delta[0].receipt.event_id.as_str(), "$target:test");

    engine.shutdown().await;
}

#[tokio::test]
async fn waiter_registered_before_announce_is_woken() {
    let engine = TestEngine::spawn().await.unwrap();
    join(&engine, "!r:test", "@alice:test").await;
    let since = engine.streams.latest();

    let request = engine
        .sync_in_background(
            SyncRequest::new(user("@alice:test"))
                .with_since(since.to_string())
                .with_timeout_ms(10_000),
        )
        .await;

    engine
        .publish(
            topics::ROOM_EVENTS,
            messages::room_event("$hello:test", "!r:test", "@bob:test", "hello"),
        )
        .await;

    let resp = request.await.unwrap().unwrap();
    assert_eq!(resp.timeline.len(), 1);
    assert_eq!(resp.timeline[0].events[0].event.content["body"], "hello");
    assert!(resp.next_batch.is_after(&since));

    engine.shutdown().await;
}

#[tokio::test]
async fn waiter_registering_after_announce_returns_immediately() {
    let engine = TestEngine::spawn().await.unwrap();
    join(&engine, "!r:test", "@alice:test").await;
    let since = engine.streams.latest();

    engine
        .publish(
            topics::TYPING,
            messages::typing("!r:test", "@bob:test", true),
        )
        .await;
    engine.wait_for_latest(|t| t.typing > since.typing).await;

    let started = std::time::Instant::now();
    let outcome = engine
        .notifier
        .wait(
            &BTreeSet::from([room("!r:test")]),
            &user("@alice:test"),
            &since,
            Instant::now() + Duration::from_secs(30),
            &CancellationToken::new(),
        )
        .await;
    assert!(matches!(outcome, WaitOutcome::Woken(t) if t.typing > since.typing));
    assert!(started.elapsed() < Duration::from_secs(5));

    engine.shutdown().await;
}

#[tokio::test]
async fn unrelated_room_does_not_wake() {
    let engine = TestEngine::spawn().await.unwrap();
    join(&engine, "!mine:test", "@alice:test").await;
    join(&engine, "!other:test", "@bob:test").await;
    let since = engine.streams.latest();

    let request = engine
        .sync_in_background(
            SyncRequest::new(user("@alice:test"))
                .with_since(since.to_string())
                .with_timeout_ms(300),
        )
        .await;
    engine
        .publish(
            topics::ROOM_EVENTS,
            messages::room_event("$x:test", "!other:test", "@bob:test", "not for alice"),
        )
        .await;

    let resp = request.await.unwrap().unwrap();
    assert!(resp.is_empty());
    // The timed-out token still covers the unrelated event.
    assert!(resp.next_batch.pdu >= since.pdu);

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn deadline_returns_no_new_data_and_unregisters() {
    let notifier = Notifier::new();
    let since = StreamingToken::default();
    let start = Instant::now();
    let deadline = start + Duration::from_secs(30);

    let outcome = notifier
        .wait(
            &BTreeSet::from([room("!r:test")]),
            &user("@alice:test"),
            &since,
            deadline,
            &CancellationToken::new(),
        )
        .await;
    assert_eq!(outcome, WaitOutcome::TimedOut);
    assert_eq!(Instant::now(), deadline);
    assert_eq!(start.elapsed(), Duration::from_secs(30));
    assert_eq!(notifier.active_waiters(), 0);
    assert_eq!(notifier.registered_receivers(), 0);

    notifier.prune_idle();
    assert_eq!(notifier.scope_count(), 0);
}

#[tokio::test]
async fn timed_out_request_returns_current_token() {
    let engine = TestEngine::spawn().await.unwrap();
    join(&engine, "!r:test", "@alice:test").await;
    let since = engine.streams.latest();

    let resp = engine
        .sync(
            SyncRequest::new(user("@alice:test"))
                .with_since(since.to_string())
                .with_timeout_ms(100),
        )
        .await
        .unwrap();
    assert!(resp.is_empty());
    assert_eq!(resp.next_batch, since);

    engine.shutdown().await;
}

#[tokio::test]
async fn cancellation_ends_a_blocked_request() {
    let engine = TestEngine::spawn().await.unwrap();
    let cancel = CancellationToken::new();

    let request = {
        let pool = std::sync::Arc::clone(&engine.pool);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            pool.on_incoming_sync_request(
                SyncRequest::new(user("@alice:test"))
                    .with_since("s0")
                    .with_timeout_ms(60_000),
                &cancel,
            )
            .await
        })
    };
    common::engine::wait_until(|| engine.notifier.active_waiters() == 1).await;

    cancel.cancel();
    let result = request.await.unwrap();
    assert!(matches!(result, Err(SyncError::Canceled)));
    assert_eq!(engine.notifier.active_waiters(), 0);
    assert_eq!(engine.notifier.registered_receivers(), 0);

    engine.shutdown().await;
}

#[tokio::test]
async fn many_waiters_on_one_room_all_wake() {
    let engine = TestEngine::spawn().await.unwrap();
    let members: Vec<String> = (0..20).map(|i| format!("@user{i}:test")).collect();
    for member in &members {
        join(&engine, "!big:test", member).await;
    }
    let since = engine.streams.latest();

    let mut requests = Vec::new();
    for member in &members {
        requests.push(
            engine
                .sync_in_background(
                    SyncRequest::new(user(member))
                        .with_since(since.to_string())
                        .with_timeout_ms(10_000),
                )
                .await,
        );
    }

    engine
        .publish(
            topics::ROOM_EVENTS,
            messages::room_event("$all:test", "!big:test", "@user0:test", "everyone"),
        )
        .await;

    for request in requests {
        let resp = request.await.unwrap().unwrap();
        assert_eq!(resp.timeline.len(), 1);
    }
    assert_eq!(engine.notifier.active_waiters(), 0);

    engine.shutdown().await;
}
