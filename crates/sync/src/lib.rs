// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! tandem-sync: client side of the multi-device sync protocol.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ SyncService │────►│  Transport  │────►│    Relay    │
//! │ (one loop)  │◄────│   (trait)   │◄────│ (fan-out)   │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!    │       │
//!    │       ▼
//!    │  ┌─────────────┐      ┌─────────────┐
//!    │  │ OfflineQueue│─────►│   Storage   │
//!    │  └─────────────┘      └─────────────┘
//!    ▼
//! ┌─────────────┐
//! │  EventBus   │  (broadcast subscribers)
//! └─────────────┘
//! ```
//!
//! # Features
//!
//! - WebSocket transport with a `hello`/`welcome` handshake
//! - Reconnect with capped exponential backoff and heartbeat liveness
//! - Offline queue persisted as JSON Lines, drained on reconnect
//! - Presence and typing aggregation with self-origin filtering
//! - Injectable transport, storage and clock for testing

pub mod config;
pub mod error;
pub mod events;
pub mod identity;
pub mod lifecycle;
pub mod presence;
pub mod protocol;
pub mod queue;
pub mod runner;
pub mod service;
pub mod storage;
pub mod timers;
pub mod transport;
pub mod typing;

pub use config::{ConfigError, SyncConfig};
pub use error::{SyncError, SyncResult};
pub use events::{EventBus, SyncEvent};
pub use identity::load_or_create_device_id;
pub use lifecycle::{Backoff, ConnectionState, Phase, RetryDecision};
pub use presence::PresenceSet;
pub use protocol::{Dispatcher, Route};
pub use queue::{Deliver, DeliveryError, DrainReport, OfflineQueue, OfflineQueueItem, QueueItemKind};
pub use runner::{Command, SyncHandle, SyncRunner, SyncSnapshot};
pub use service::{Credentials, Delivery, SyncService, Wake};
pub use storage::{FileStorage, MemoryStorage, Storage, StorageError, SyncStore};
pub use timers::{TimerKind, Timers};
pub use transport::{Transport, TransportError, TransportResult, WebSocketTransport};
pub use typing::TypingDebouncer;

#[cfg(test)]
mod test_helpers;
