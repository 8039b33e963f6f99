// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Envelope wrapping and inbound routing.

use tandem_core::{
    ClockSource, DeviceStatus, DeviceType, Preferences, SyncMessage, SyncPayload,
};

/// Where an inbound envelope goes.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    Conversation(SyncMessage),
    DeviceStatus {
        device_id: String,
        status: DeviceStatus,
        device_type: Option<DeviceType>,
    },
    Typing {
        device_id: String,
        is_typing: bool,
    },
    Preferences {
        device_id: String,
        preferences: Preferences,
    },
}

/// Wraps outbound payloads for this device and routes inbound envelopes.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    local_device_id: String,
}

impl Dispatcher {
    pub fn new(local_device_id: impl Into<String>) -> Self {
        Dispatcher {
            local_device_id: local_device_id.into(),
        }
    }

    pub fn local_device_id(&self) -> &str {
        &self.local_device_id
    }

    /// Stamps `payload` with this device's id and the current time.
    pub fn wrap(&self, payload: SyncPayload, user_id: &str, clock: &dyn ClockSource) -> SyncMessage {
        SyncMessage::new(payload, user_id, self.local_device_id.as_str(), clock)
    }

    /// Routes an inbound envelope. Returns `None` for our own messages,
    /// whatever their type.
    pub fn route(&self, message: SyncMessage) -> Option<Route> {
        if message.is_from(&self.local_device_id) {
            return None;
        }
        let device_id = message.device_id().to_string();
        let route = match message.payload() {
            SyncPayload::ConversationUpdate(_) => Route::Conversation(message),
            SyncPayload::DeviceStatus(update) => Route::DeviceStatus {
                device_id,
                status: update.status,
                device_type: update.device_type,
            },
            SyncPayload::TypingIndicator(indicator) => Route::Typing {
                device_id,
                is_typing: indicator.is_typing,
            },
            SyncPayload::UserPreference(update) => Route::Preferences {
                device_id,
                preferences: update.preferences.clone(),
            },
        };
        Some(route)
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
