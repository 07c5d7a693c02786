//! Producer messages as they appear on the bus.

#![allow(dead_code)]

use serde_json::json;
use syncd_ng::bus::BusMessage;
use syncd_ng::consumers::headers;

pub fn room_event(event_id: &str, room_id: &str, sender: &str, body: &str) -> BusMessage {
    BusMessage::json(&json!({
        "event_id": event_id,
        "room_id": room_id,
        "sender": sender,
        "type": "m.room.message",
        "content": { "body": body }
    }))
    .expect("valid json")
    .with_header(headers::OUTPUT_TYPE, "new_room_event")
}

pub fn membership(event_id: &str, room_id: &str, target: &str, membership: &str) -> BusMessage {
    BusMessage::json(&json!({
        "event_id": event_id,
        "room_id": room_id,
        "sender": target,
        "type": "m.room.member",
        "state_key": target,
        "content": { "membership": membership }
    }))
    .expect("valid json")
    .with_header(headers::OUTPUT_TYPE, "new_room_event")
}

pub fn receipt(room_id: &str, user_id: &str, event_id: &str) -> BusMessage {
    receipt_at(room_id, user_id, event_id, 1_700_000_000_000)
}

pub fn receipt_at(room_id: &str, user_id: &str, event_id: &str, ts: u64) -> BusMessage {
    BusMessage::new(Vec::new())
        .with_header(headers::ROOM_ID, room_id)
        .with_header(headers::USER_ID, user_id)
        .with_header(headers::EVENT_ID, event_id)
        .with_header("type", "m.read")
        .with_header("timestamp", ts.to_string())
}

pub fn typing(room_id: &str, user_id: &str, typing: bool) -> BusMessage {
    BusMessage::new(Vec::new())
        .with_header(headers::ROOM_ID, room_id)
        .with_header(headers::USER_ID, user_id)
        .with_header("typing", typing.to_string())
}

pub fn to_device(user_id: &str, device_id: &str, sender: &str) -> BusMessage {
    BusMessage::json(&json!({
        "sender": sender,
        "type": "m.room_key",
        "content": { "room_id": "!r:test" }
    }))
    .expect("valid json")
    .with_header(headers::USER_ID, user_id)
    .with_header(headers::DEVICE_ID, device_id)
}

pub fn presence(user_id: &str, presence: &str) -> BusMessage {
    presence_at(user_id, presence, 0)
}

pub fn presence_at(user_id: &str, presence: &str, last_active_ts: u64) -> BusMessage {
    BusMessage::new(Vec::new())
        .with_header(headers::USER_ID, user_id)
        .with_header("presence", presence)
        .with_header("last_active_ts", last_active_ts.to_string())
}
