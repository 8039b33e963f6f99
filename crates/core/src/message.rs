// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The sync envelope and its typed payloads.
//!
//! On the wire every event is a flat JSON object:
//!
//! ```text
//! { "type": "typing_indicator", "userId": "u1", "deviceId": "d1",
//!   "timestamp": 1700000000000, "payload": { "isTyping": true } }
//! ```
//!
//! The `payload` shape depends on `type`. A [`SyncMessage`] is immutable once
//! built: fields are private and only readable through accessors.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::ClockSource;
use crate::device::{DeviceStatus, DeviceType};
use crate::error::{Error, Result};

/// Arbitrary user preference values keyed by name.
pub type Preferences = serde_json::Map<String, serde_json::Value>;

/// Discriminant of a sync event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    ConversationUpdate,
    DeviceStatus,
    TypingIndicator,
    UserPreference,
}

impl MessageType {
    /// Returns the string representation used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::ConversationUpdate => "conversation_update",
            MessageType::DeviceStatus => "device_status",
            MessageType::TypingIndicator => "typing_indicator",
            MessageType::UserPreference => "user_preference",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "conversation_update" => Ok(MessageType::ConversationUpdate),
            "device_status" => Ok(MessageType::DeviceStatus),
            "typing_indicator" => Ok(MessageType::TypingIndicator),
            "user_preference" => Ok(MessageType::UserPreference),
            _ => Err(Error::InvalidMessageType(s.to_string())),
        }
    }
}

/// Who authored a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// A conversation message as persisted by the conversation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Creates a message outside of any named conversation.
    pub fn new(
        id: impl Into<String>,
        role: MessageRole,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        ChatMessage {
            id: id.into(),
            conversation_id: None,
            role,
            content: content.into(),
            created_at,
        }
    }
}

/// `conversation_update` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationUpdate {
    pub message: ChatMessage,
}

/// `device_status` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatusUpdate {
    pub status: DeviceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<DeviceType>,
}

/// `typing_indicator` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingIndicator {
    pub is_typing: bool,
}

/// `user_preference` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreference {
    pub preferences: Preferences,
}

/// Typed payload of a sync event.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncPayload {
    ConversationUpdate(ConversationUpdate),
    DeviceStatus(DeviceStatusUpdate),
    TypingIndicator(TypingIndicator),
    UserPreference(UserPreference),
}

impl SyncPayload {
    /// Creates a `conversation_update` payload.
    pub fn conversation(message: ChatMessage) -> Self {
        SyncPayload::ConversationUpdate(ConversationUpdate { message })
    }

    /// Creates a `device_status` payload.
    pub fn device_status(status: DeviceStatus, device_type: Option<DeviceType>) -> Self {
        SyncPayload::DeviceStatus(DeviceStatusUpdate {
            status,
            device_type,
        })
    }

    /// Creates a `typing_indicator` payload.
    pub fn typing(is_typing: bool) -> Self {
        SyncPayload::TypingIndicator(TypingIndicator { is_typing })
    }

    /// Creates a `user_preference` payload.
    pub fn preferences(preferences: Preferences) -> Self {
        SyncPayload::UserPreference(UserPreference { preferences })
    }

    /// Returns the message type this payload travels under.
    pub fn message_type(&self) -> MessageType {
        match self {
            SyncPayload::ConversationUpdate(_) => MessageType::ConversationUpdate,
            SyncPayload::DeviceStatus(_) => MessageType::DeviceStatus,
            SyncPayload::TypingIndicator(_) => MessageType::TypingIndicator,
            SyncPayload::UserPreference(_) => MessageType::UserPreference,
        }
    }

    /// Serializes just the payload body, without the envelope.
    pub fn to_json_value(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            SyncPayload::ConversationUpdate(p) => serde_json::to_value(p),
            SyncPayload::DeviceStatus(p) => serde_json::to_value(p),
            SyncPayload::TypingIndicator(p) => serde_json::to_value(p),
            SyncPayload::UserPreference(p) => serde_json::to_value(p),
        }
    }

    /// Rebuilds a payload from its type and body.
    pub fn from_json_value(message_type: MessageType, value: serde_json::Value) -> Result<Self> {
        Ok(match message_type {
            MessageType::ConversationUpdate => {
                SyncPayload::ConversationUpdate(serde_json::from_value(value)?)
            }
            MessageType::DeviceStatus => SyncPayload::DeviceStatus(serde_json::from_value(value)?),
            MessageType::TypingIndicator => {
                SyncPayload::TypingIndicator(serde_json::from_value(value)?)
            }
            MessageType::UserPreference => {
                SyncPayload::UserPreference(serde_json::from_value(value)?)
            }
        })
    }
}

/// The envelope around every synchronization event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEnvelope", into = "RawEnvelope")]
pub struct SyncMessage {
    payload: SyncPayload,
    user_id: String,
    device_id: String,
    timestamp: u64,
}

/// Wire shape of the envelope, before the payload is typed.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEnvelope {
    #[serde(rename = "type")]
    message_type: MessageType,
    user_id: String,
    device_id: String,
    timestamp: u64,
    payload: serde_json::Value,
}

impl TryFrom<RawEnvelope> for SyncMessage {
    type Error = Error;

    fn try_from(raw: RawEnvelope) -> Result<Self> {
        let payload = SyncPayload::from_json_value(raw.message_type, raw.payload)?;
        Ok(SyncMessage {
            payload,
            user_id: raw.user_id,
            device_id: raw.device_id,
            timestamp: raw.timestamp,
        })
    }
}

impl From<SyncMessage> for RawEnvelope {
    fn from(msg: SyncMessage) -> Self {
        RawEnvelope {
            message_type: msg.payload.message_type(),
            // Payload structs contain only string keys and plain values.
            payload: msg.payload.to_json_value().unwrap_or(serde_json::Value::Null),
            user_id: msg.user_id,
            device_id: msg.device_id,
            timestamp: msg.timestamp,
        }
    }
}

impl SyncMessage {
    /// Wraps a payload, stamping the send time from `clock`.
    pub fn new(
        payload: SyncPayload,
        user_id: impl Into<String>,
        device_id: impl Into<String>,
        clock: &dyn ClockSource,
    ) -> Self {
        Self::at(payload, user_id, device_id, clock.now_ms())
    }

    /// Wraps a payload with an explicit timestamp (epoch milliseconds).
    pub fn at(
        payload: SyncPayload,
        user_id: impl Into<String>,
        device_id: impl Into<String>,
        timestamp: u64,
    ) -> Self {
        SyncMessage {
            payload,
            user_id: user_id.into(),
            device_id: device_id.into(),
            timestamp,
        }
    }

    pub fn message_type(&self) -> MessageType {
        self.payload.message_type()
    }

    pub fn payload(&self) -> &SyncPayload {
        &self.payload
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Id of the sending device.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Sender-side send time in epoch milliseconds. Not ordering-authoritative.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Returns true if this message was sent by `device_id`.
    pub fn is_from(&self, device_id: &str) -> bool {
        self.device_id == device_id
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
