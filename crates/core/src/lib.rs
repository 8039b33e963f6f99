// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! tandem-core: Shared types for multi-device sync.
//!
//! This crate provides the device model, the sync envelope and its payloads,
//! the wire frames, and the clock abstraction used by both the tandem-sync
//! client library and the tandem-relay server.

pub mod clock;
pub mod device;
pub mod error;
pub mod message;
pub mod protocol;

pub use clock::{ClockSource, ManualClock, SystemClock};
pub use device::{Capability, Device, DeviceStatus, DeviceType};
pub use error::{Error, Result};
pub use message::{
    ChatMessage, ConversationUpdate, DeviceStatusUpdate, MessageRole, MessageType, Preferences,
    SyncMessage, SyncPayload, TypingIndicator, UserPreference,
};
pub use protocol::{ClientFrame, Handshake, ServerFrame};
