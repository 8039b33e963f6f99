// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::test_helpers::{chat, envelope_from};
use tandem_core::{ManualClock, MessageType};
use yare::parameterized;

fn payload_for(message_type: MessageType) -> SyncPayload {
    match message_type {
        MessageType::ConversationUpdate => SyncPayload::conversation(chat("m1", "hi")),
        MessageType::DeviceStatus => SyncPayload::device_status(DeviceStatus::Online, None),
        MessageType::TypingIndicator => SyncPayload::typing(true),
        MessageType::UserPreference => {
            let mut prefs = Preferences::new();
            prefs.insert("theme".into(), serde_json::json!("dark"));
            SyncPayload::preferences(prefs)
        }
    }
}

#[parameterized(
    conversation = { MessageType::ConversationUpdate },
    status = { MessageType::DeviceStatus },
    typing = { MessageType::TypingIndicator },
    prefs = { MessageType::UserPreference },
)]
fn self_origin_is_discarded(message_type: MessageType) {
    let dispatcher = Dispatcher::new("d1");
    let message = envelope_from("d1", payload_for(message_type));
    assert_eq!(dispatcher.route(message), None);
}

#[test]
fn wrap_stamps_local_identity() {
    let dispatcher = Dispatcher::new("d1");
    let clock = ManualClock::new(1234);
    let message = dispatcher.wrap(SyncPayload::typing(false), "user-1", &clock);
    assert_eq!(message.device_id(), "d1");
    assert_eq!(message.user_id(), "user-1");
    assert_eq!(message.timestamp(), 1234);
    assert_eq!(message.message_type(), MessageType::TypingIndicator);
}

#[test]
fn conversation_routes_whole_envelope() {
    let dispatcher = Dispatcher::new("d1");
    let message = envelope_from("d2", payload_for(MessageType::ConversationUpdate));
    assert_eq!(
        dispatcher.route(message.clone()),
        Some(Route::Conversation(message))
    );
}

#[test]
fn device_status_routes_sender() {
    let dispatcher = Dispatcher::new("d1");
    let message = envelope_from(
        "d2",
        SyncPayload::device_status(DeviceStatus::Away, Some(DeviceType::Desktop)),
    );
    assert_eq!(
        dispatcher.route(message),
        Some(Route::DeviceStatus {
            device_id: "d2".into(),
            status: DeviceStatus::Away,
            device_type: Some(DeviceType::Desktop),
        })
    );
}

#[test]
fn typing_routes_flag() {
    let dispatcher = Dispatcher::new("d1");
    let message = envelope_from("d3", SyncPayload::typing(true));
    assert_eq!(
        dispatcher.route(message),
        Some(Route::Typing {
            device_id: "d3".into(),
            is_typing: true,
        })
    );
}

#[test]
fn preferences_route_map() {
    let dispatcher = Dispatcher::new("d1");
    let message = envelope_from("d2", payload_for(MessageType::UserPreference));
    match dispatcher.route(message) {
        Some(Route::Preferences {
            device_id,
            preferences,
        }) => {
            assert_eq!(device_id, "d2");
            assert_eq!(preferences["theme"], "dark");
        }
        other => unreachable!("unexpected route {other:?}"),
    }
}
