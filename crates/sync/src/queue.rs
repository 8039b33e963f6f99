// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Offline queue and retry engine.
//!
//! Outbound events that cannot be sent right away are persisted as
//! [`OfflineQueueItem`]s in FIFO order. [`OfflineQueue::drain`] replays them
//! through a [`Deliver`] implementation:
//!
//! - success removes the item
//! - failure charges one retry; an item that reaches its retry limit is
//!   dropped with a warning and reported back to the caller
//! - [`DeliveryError::Offline`] abandons the pass without charging anything
//!
//! Only one drain runs at a time. Items enqueued while a pass is in flight
//! survive it: the pass merges its results into whatever the store holds
//! when it finishes.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tandem_core::{MessageType, SyncPayload};
use tracing::{debug, warn};

use crate::error::{SyncError, SyncResult};
use crate::storage::{Storage, StorageResult, SyncStore};

/// What a queued item carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueItemKind {
    Message,
    DeviceUpdate,
    PreferencesUpdate,
}

impl QueueItemKind {
    /// Kind for an outbound message type. Typing indicators are never queued.
    pub fn for_message_type(message_type: MessageType) -> Option<Self> {
        match message_type {
            MessageType::ConversationUpdate => Some(QueueItemKind::Message),
            MessageType::DeviceStatus => Some(QueueItemKind::DeviceUpdate),
            MessageType::UserPreference => Some(QueueItemKind::PreferencesUpdate),
            MessageType::TypingIndicator => None,
        }
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            QueueItemKind::Message => MessageType::ConversationUpdate,
            QueueItemKind::DeviceUpdate => MessageType::DeviceStatus,
            QueueItemKind::PreferencesUpdate => MessageType::UserPreference,
        }
    }
}

/// An outbound event waiting for a connected channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineQueueItem {
    pub id: String,
    pub kind: QueueItemKind,
    /// Payload body, without the envelope.
    pub data: serde_json::Value,
    /// Epoch milliseconds; also the envelope timestamp on delivery.
    pub enqueued_at: u64,
    pub retry_count: u32,
    pub max_retries: u32,
}

impl OfflineQueueItem {
    /// Builds an item from an outbound payload.
    pub fn from_payload(
        id: impl Into<String>,
        payload: &SyncPayload,
        enqueued_at: u64,
        max_retries: u32,
    ) -> SyncResult<Self> {
        let message_type = payload.message_type();
        let kind = QueueItemKind::for_message_type(message_type).ok_or_else(|| {
            SyncError::Protocol(format!("{message_type} events are not queued"))
        })?;
        let data = payload
            .to_json_value()
            .map_err(|e| SyncError::Protocol(e.to_string()))?;
        Ok(OfflineQueueItem {
            id: id.into(),
            kind,
            data,
            enqueued_at,
            retry_count: 0,
            max_retries,
        })
    }

    /// Rebuilds the typed payload.
    pub fn payload(&self) -> SyncResult<SyncPayload> {
        Ok(SyncPayload::from_json_value(
            self.kind.message_type(),
            self.data.clone(),
        )?)
    }
}

/// Why a delivery did not go through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The channel is gone; no point trying the rest of the queue.
    Offline,
    /// This item failed; charge a retry.
    Failed(String),
}

/// Sends one queued item.
pub trait Deliver: Send {
    fn deliver<'a>(
        &'a mut self,
        item: &'a OfflineQueueItem,
    ) -> Pin<Box<dyn Future<Output = Result<(), DeliveryError>> + Send + 'a>>;
}

/// Outcome of one drain pass.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DrainReport {
    pub delivered: usize,
    /// Failed items kept for another pass.
    pub retried: usize,
    /// Items that hit their retry limit and were discarded.
    pub dropped: Vec<OfflineQueueItem>,
    /// The pass stopped early because the channel went away.
    pub aborted: bool,
    /// Another pass was already running.
    pub skipped: bool,
}

/// Persisted FIFO of outbound items.
pub struct OfflineQueue<S> {
    store: SyncStore<S>,
    draining: AtomicBool,
}

/// Clears the draining flag when the pass ends, however it ends.
struct DrainGuard<'a>(&'a AtomicBool);

impl<'a> DrainGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| DrainGuard(flag))
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<S: Storage> OfflineQueue<S> {
    pub fn new(store: SyncStore<S>) -> Self {
        OfflineQueue {
            store,
            draining: AtomicBool::new(false),
        }
    }

    pub fn store(&self) -> &SyncStore<S> {
        &self.store
    }

    /// Appends an item. Returns items evicted by the capacity limit.
    pub fn enqueue(&self, item: OfflineQueueItem) -> StorageResult<Vec<OfflineQueueItem>> {
        debug!(id = %item.id, kind = ?item.kind, "queued offline item");
        let mut items = self.store.load_queue()?;
        items.push(item);
        let evicted = self.store.save_queue(&items)?;
        for item in &evicted {
            warn!(id = %item.id, "offline queue full, dropped oldest message");
        }
        Ok(evicted)
    }

    /// Snapshot of the queue in FIFO order.
    pub fn items(&self) -> StorageResult<Vec<OfflineQueueItem>> {
        self.store.load_queue()
    }

    pub fn len(&self) -> StorageResult<usize> {
        Ok(self.items()?.len())
    }

    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }

    /// True while a drain pass is running.
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    /// Replays the queue through `deliverer`.
    pub async fn drain<D: Deliver + ?Sized>(&self, deliverer: &mut D) -> StorageResult<DrainReport> {
        let Some(_guard) = DrainGuard::acquire(&self.draining) else {
            debug!("drain already in progress");
            return Ok(DrainReport {
                skipped: true,
                ..DrainReport::default()
            });
        };

        let snapshot = self.store.load_queue()?;
        if snapshot.is_empty() {
            return Ok(DrainReport::default());
        }

        let mut report = DrainReport::default();
        // id -> replacement; None means the item is gone
        let mut outcomes: HashMap<String, Option<OfflineQueueItem>> = HashMap::new();

        for item in snapshot {
            match deliverer.deliver(&item).await {
                Ok(()) => {
                    report.delivered += 1;
                    outcomes.insert(item.id.clone(), None);
                }
                Err(DeliveryError::Offline) => {
                    debug!("channel lost mid-drain, stopping pass");
                    report.aborted = true;
                    break;
                }
                Err(DeliveryError::Failed(reason)) => {
                    let mut item = item;
                    item.retry_count += 1;
                    if item.retry_count >= item.max_retries {
                        warn!(
                            id = %item.id,
                            attempts = item.retry_count,
                            reason = %reason,
                            "dropping queued item after max retries"
                        );
                        outcomes.insert(item.id.clone(), None);
                        report.dropped.push(item);
                    } else {
                        debug!(id = %item.id, attempt = item.retry_count, reason = %reason, "delivery failed");
                        report.retried += 1;
                        outcomes.insert(item.id.clone(), Some(item));
                    }
                }
            }
        }

        let merged: Vec<OfflineQueueItem> = self
            .store
            .load_queue()?
            .into_iter()
            .filter_map(|item| match outcomes.remove(&item.id) {
                Some(replacement) => replacement,
                None => Some(item),
            })
            .collect();
        let evicted = self.store.save_queue(&merged)?;
        report.dropped.extend(evicted);

        Ok(report)
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
