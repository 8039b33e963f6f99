// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for sync crate tests.

#![allow(clippy::unwrap_used)]

use chrono::{TimeZone, Utc};
use tandem_core::{ChatMessage, DeviceStatus, MessageRole, SyncMessage, SyncPayload};

use crate::queue::OfflineQueueItem;

/// A user-authored chat message.
pub fn chat(id: &str, content: &str) -> ChatMessage {
    ChatMessage::new(
        id,
        MessageRole::User,
        content,
        Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
    )
}

/// Queued conversation message with the default retry limit.
pub fn message_item(id: &str, enqueued_at: u64) -> OfflineQueueItem {
    OfflineQueueItem::from_payload(id, &SyncPayload::conversation(chat(id, "hi")), enqueued_at, 3)
        .unwrap()
}

/// Queued device status update with the default retry limit.
pub fn device_item(id: &str, enqueued_at: u64) -> OfflineQueueItem {
    OfflineQueueItem::from_payload(
        id,
        &SyncPayload::device_status(DeviceStatus::Away, None),
        enqueued_at,
        3,
    )
    .unwrap()
}

/// Envelope from another device of `user-1`.
pub fn envelope_from(device_id: &str, payload: SyncPayload) -> SyncMessage {
    SyncMessage::at(payload, "user-1", device_id, 1_700_000_000_000)
}
