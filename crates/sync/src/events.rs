// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Events published to subscribers.
//!
//! Subscribers hold a `broadcast::Receiver`; dropping it unsubscribes. A
//! subscriber that falls more than the channel capacity behind sees
//! `RecvError::Lagged` and skips ahead.

use std::time::Duration;

use tandem_core::{Device, DeviceStatus, Preferences, SyncMessage};
use tokio::sync::broadcast;

use crate::queue::OfflineQueueItem;

#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Handshake accepted; `devices` are the peers online right now.
    Connected { devices: Vec<Device> },
    /// The channel went down without a local request.
    Disconnected { reason: String },
    ReconnectScheduled { attempt: u32, delay: Duration },
    /// Retries are exhausted.
    ReconnectFailed { error: String },
    /// Credentials were missing or refused.
    AuthenticationFailed { reason: String },
    MessageReceived(SyncMessage),
    DeviceStatusUpdate {
        device_id: String,
        status: DeviceStatus,
    },
    TypingIndicator {
        device_id: String,
        is_typing: bool,
    },
    PreferencesUpdated {
        device_id: String,
        preferences: Preferences,
    },
    /// A queued item was dropped without being delivered.
    DeliveryFailed(OfflineQueueItem),
}

/// Fan-out point for [`SyncEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        EventBus { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }

    /// Publishes to current subscribers. Having none is fine.
    pub fn emit(&self, event: SyncEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
