//! Producer input handling and per-category delivery.

mod common;

use common::TestEngine;
use common::messages;
use syncd_ng::bus::BusMessage;
use syncd_ng::consumers::{headers, topics};
use syncd_ng::error::SyncError;
use syncd_ng::sync::SyncRequest;
use syncd_proto::{DeviceId, Presence, StreamPosition, UserId};

fn user(id: &str) -> UserId {
    UserId::parse(id).unwrap()
}

#[tokio::test]
async fn malformed_messages_are_skipped() {
    let engine = TestEngine::spawn().await.unwrap();

    // Missing headers, bad body, unparseable ids: none may change state.
    engine
        .publish(topics::RECEIPTS, BusMessage::new(Vec::new()))
        .await;
    engine
        .publish(
            topics::ROOM_EVENTS,
            BusMessage::new("{ not json").with_header(headers::OUTPUT_TYPE, "new_room_event"),
        )
        .await;
    engine
        .publish(
            topics::SEND_TO_DEVICE,
            messages::to_device("not-a-user", "PHONE", "@alice:test"),
        )
        .await;
    engine
        .publish(topics::PRESENCE, messages::presence("@alice:test", "sleeping"))
        .await;

    // A valid message behind them on the same topic is still processed.
    engine
        .publish(
            topics::RECEIPTS,
            messages::receipt("!r:test", "@alice:test", "$e:test"),
        )
        .await;
    engine
        .publish(topics::PRESENCE, messages::presence("@alice:test", "online"))
        .await;
    engine
        .wait_for_latest(|t| !t.receipt.is_zero() && !t.presence.is_zero())
        .await;

    let latest = engine.streams.latest();
    assert_eq!(latest.receipt, StreamPosition::new(1));
    assert_eq!(latest.presence, StreamPosition::new(1));
    assert!(latest.pdu.is_zero());
    assert!(latest.send_to_device.is_zero());

    engine.shutdown().await;
}

#[tokio::test]
async fn invite_is_delivered_then_retired_on_join() {
    let engine = TestEngine::spawn().await.unwrap();
    let bob = user("@bob:test");

    engine
        .publish(
            topics::ROOM_EVENTS,
            messages::membership("$inv:test", "!r:test", "@bob:test", "invite"),
        )
        .await;
    engine.wait_for_latest(|t| !t.invite.is_zero()).await;

    let first = engine.sync(SyncRequest::new(bob.clone())).await.unwrap();
    assert_eq!(first.invites.len(), 1);
    assert!(!first.invites[0].invite.retired);

    engine
        .publish(
            topics::ROOM_EVENTS,
            messages::membership("$join:test", "!r:test", "@bob:test", "join"),
        )
        .await;
    engine
        .wait_for_latest(|t| t.invite > first.next_batch.invite)
        .await;

    let second = engine
        .sync(
            SyncRequest::new(bob)
                .with_since(first.next_batch.to_string())
                .with_timeout_ms(0),
        )
        .await
        .unwrap();
    assert_eq!(second.invites.len(), 1);
    assert!(second.invites[0].invite.retired);
    // The join itself arrives in the now-joined room's timeline.
    assert_eq!(second.timeline.len(), 1);

    engine.shutdown().await;
}

#[tokio::test]
async fn redelivery_never_brings_back_old_state() {
    let engine = TestEngine::spawn().await.unwrap();
    let bob = user("@bob:test");

    let invite = messages::membership("$inv:test", "!r:test", "@bob:test", "invite");
    engine.publish(topics::ROOM_EVENTS, invite.clone()).await;
    engine
        .publish(
            topics::ROOM_EVENTS,
            messages::membership("$join:test", "!r:test", "@bob:test", "join"),
        )
        .await;
    engine
        .publish(
            topics::RECEIPTS,
            messages::receipt_at("!r:test", "@bob:test", "$a:test", 1_000),
        )
        .await;
    engine
        .publish(
            topics::RECEIPTS,
            messages::receipt_at("!r:test", "@bob:test", "$b:test", 2_000),
        )
        .await;
    engine
        .publish(topics::PRESENCE, messages::presence_at("@bob:test", "online", 1_000))
        .await;
    engine
        .publish(topics::PRESENCE, messages::presence_at("@bob:test", "offline", 2_000))
        .await;
    engine
        .wait_for_latest(|t| {
            t.pdu == StreamPosition::new(2)
                && t.receipt == StreamPosition::new(2)
                && t.presence == StreamPosition::new(2)
        })
        .await;
    let settled = engine.streams.latest();

    // Every message arrives again, followed by one marker per topic. Topics
    // are consumed in order, so the markers landing means the repeats were
    // handled.
    engine.publish(topics::ROOM_EVENTS, invite).await;
    engine
        .publish(
            topics::RECEIPTS,
            messages::receipt_at("!r:test", "@bob:test", "$a:test", 1_000),
        )
        .await;
    engine
        .publish(
            topics::RECEIPTS,
            messages::receipt_at("!r:test", "@bob:test", "$b:test", 2_000),
        )
        .await;
    engine
        .publish(topics::PRESENCE, messages::presence_at("@bob:test", "online", 1_000))
        .await;
    engine
        .publish(topics::PRESENCE, messages::presence_at("@bob:test", "offline", 2_000))
        .await;

    engine
        .publish(
            topics::ROOM_EVENTS,
            messages::room_event("$marker:test", "!elsewhere:test", "@carol:test", "marker"),
        )
        .await;
    engine
        .publish(
            topics::RECEIPTS,
            messages::receipt("!elsewhere:test", "@carol:test", "$marker:test"),
        )
        .await;
    engine
        .publish(topics::PRESENCE, messages::presence_at("@carol:test", "online", 1))
        .await;
    engine
        .wait_for_latest(|t| {
            t.pdu > settled.pdu && t.receipt > settled.receipt && t.presence > settled.presence
        })
        .await;

    // Only the markers moved the streams.
    let latest = engine.streams.latest();
    assert_eq!(latest.invite, settled.invite);

    let resp = engine
        .sync(
            SyncRequest::new(bob.clone())
                .with_since(settled.to_string())
                .with_timeout_ms(0),
        )
        .await
        .unwrap();
    assert!(resp.timeline.is_empty());
    assert!(resp.invites.is_empty());
    assert!(resp.receipts.is_empty());
    assert!(resp.presence.is_empty());

    let full = engine.sync(SyncRequest::new(bob)).await.unwrap();
    assert_eq!(full.invites.len(), 1);
    assert!(full.invites[0].invite.retired);
    assert_eq!(full.receipts.len(), 1);
    assert_eq!(full.receipts[0].receipt.event_id.as_str(), "$b:test");
    assert_eq!(full.presence.len(), 1);
    assert_eq!(full.presence[0].presence, Presence::Offline);

    engine.shutdown().await;
}

#[tokio::test]
async fn leaving_user_still_receives_their_leave() {
    let engine = TestEngine::spawn().await.unwrap();
    let alice = user("@alice:test");

    engine
        .publish(
            topics::ROOM_EVENTS,
            messages::membership("$join:test", "!r:test", "@alice:test", "join"),
        )
        .await;
    engine.wait_for_latest(|t| !t.pdu.is_zero()).await;
    let since = engine.streams.latest();

    engine
        .publish(
            topics::ROOM_EVENTS,
            messages::membership("$leave:test", "!r:test", "@alice:test", "leave"),
        )
        .await;
    engine.wait_for_latest(|t| t.pdu > since.pdu).await;

    let resp = engine
        .sync(
            SyncRequest::new(alice)
                .with_since(since.to_string())
                .with_timeout_ms(0),
        )
        .await
        .unwrap();
    assert_eq!(resp.timeline.len(), 1);
    assert_eq!(
        resp.timeline[0].events[0].event.event_id.as_str(),
        "$leave:test"
    );

    engine.shutdown().await;
}

#[tokio::test]
async fn acknowledged_to_device_messages_are_cleaned_up() {
    let engine = TestEngine::spawn().await.unwrap();
    let bob = user("@bob:test");
    let phone = DeviceId::parse("PHONE").unwrap();

    for _ in 0..3 {
        engine
            .publish(
                topics::SEND_TO_DEVICE,
                messages::to_device("@bob:test", "PHONE", "@alice:test"),
            )
            .await;
    }
    engine
        .wait_for_latest(|t| t.send_to_device == StreamPosition::new(3))
        .await;

    let first = engine
        .sync(SyncRequest::new(bob.clone()).with_device(phone.clone()))
        .await
        .unwrap();
    assert_eq!(first.to_device.len(), 3);

    // Another device of the same user sees nothing.
    let laptop = engine
        .sync(SyncRequest::new(bob.clone()).with_device(DeviceId::parse("LAPTOP").unwrap()))
        .await
        .unwrap();
    assert!(laptop.to_device.is_empty());

    // Syncing from the returned token acknowledges all three.
    engine
        .sync(
            SyncRequest::new(bob.clone())
                .with_device(phone.clone())
                .with_since(first.next_batch.to_string())
                .with_timeout_ms(0),
        )
        .await
        .unwrap();
    let remaining = engine
        .db
        .send_to_device()
        .messages_in_range(
            &bob,
            &phone,
            syncd_ng::db::PositionRange::new(StreamPosition::ZERO, StreamPosition::new(3)),
        )
        .await
        .unwrap();
    assert!(remaining.is_empty());

    // Cleanup never moves the stream backwards.
    assert_eq!(engine.streams.latest().send_to_device, StreamPosition::new(3));

    engine.shutdown().await;
}

#[tokio::test]
async fn presence_reaches_users_sharing_a_room() {
    let engine = TestEngine::spawn().await.unwrap();
    for member in ["@alice:test", "@bob:test"] {
        engine
            .publish(
                topics::ROOM_EVENTS,
                messages::membership(&format!("$join-{member}"), "!r:test", member, "join"),
            )
            .await;
    }
    engine
        .wait_for_latest(|t| t.pdu == StreamPosition::new(2))
        .await;
    let since = engine.streams.latest();

    let request = engine
        .sync_in_background(
            SyncRequest::new(user("@bob:test"))
                .with_since(since.to_string())
                .with_timeout_ms(10_000),
        )
        .await;
    engine
        .publish(topics::PRESENCE, messages::presence("@alice:test", "online"))
        .await;

    let resp = request.await.unwrap().unwrap();
    assert_eq!(resp.presence.len(), 1);
    assert_eq!(resp.presence[0].user_id, user("@alice:test"));
    assert_eq!(resp.presence[0].presence, Presence::Online);

    engine.shutdown().await;
}

#[tokio::test]
async fn storage_failure_fails_only_the_request() {
    let engine = TestEngine::spawn().await.unwrap();
    engine
        .publish(
            topics::RECEIPTS,
            messages::receipt("!r:test", "@alice:test", "$e:test"),
        )
        .await;
    engine.wait_for_latest(|t| !t.receipt.is_zero()).await;
    let before = engine.streams.latest();

    engine.db.close().await;
    let err = engine
        .sync(
            SyncRequest::new(user("@alice:test"))
                .with_since("s0")
                .with_timeout_ms(0),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Storage(_)));
    assert_eq!(engine.streams.latest(), before);
    assert_eq!(engine.notifier.active_waiters(), 0);

    engine.shutdown().await;
}
