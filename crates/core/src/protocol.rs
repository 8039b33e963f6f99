// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket protocol frames for client-relay communication.
//!
//! The protocol is simple:
//! - Client opens with a `hello` handshake, then sends envelopes and pings
//! - Relay answers the handshake, fans envelopes out to every connection of
//!   the same account (sender included) and answers pings

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::device::{Device, DeviceType};
use crate::error::{Error, Result};
use crate::message::SyncMessage;

/// Credentials and identity presented when a channel opens.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub token: String,
    pub user_id: String,
    pub device_id: String,
    pub device_type: DeviceType,
}

impl Handshake {
    pub fn new(
        token: impl Into<String>,
        user_id: impl Into<String>,
        device_id: impl Into<String>,
        device_type: DeviceType,
    ) -> Self {
        Handshake {
            token: token.into(),
            user_id: user_id.into(),
            device_id: device_id.into(),
            device_type,
        }
    }

    /// Checks that token, user id and device id are all present.
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("token", &self.token),
            ("user id", &self.user_id),
            ("device id", &self.device_id),
        ]
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidInput(format!(
                "missing {}",
                missing.join(", ")
            )))
        }
    }

    /// The device this handshake identifies.
    pub fn device(&self) -> Device {
        Device::new(self.device_id.clone(), self.device_type)
    }
}

// Tokens never reach logs.
impl fmt::Debug for Handshake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handshake")
            .field("token", &"<redacted>")
            .field("user_id", &self.user_id)
            .field("device_id", &self.device_id)
            .field("device_type", &self.device_type)
            .finish()
    }
}

/// Frames sent from client to relay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Opening handshake. Must be the first frame on a channel.
    Hello(Handshake),

    /// An envelope to fan out to the account's devices.
    Sync {
        message: SyncMessage,
    },

    /// Ping message for keepalive.
    Ping {
        /// Client-chosen ID echoed in Pong.
        id: u64,
    },
}

/// Frames sent from relay to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Handshake accepted.
    Welcome {
        /// The account's other devices connected right now.
        devices: Vec<Device>,
    },

    /// Handshake refused; the relay closes the channel after sending this.
    Rejected {
        reason: String,
    },

    /// An envelope fanned out from one of the account's devices.
    Sync {
        message: SyncMessage,
    },

    /// Pong response to client Ping.
    Pong {
        /// Echoed from the Ping message.
        id: u64,
    },

    /// A frame could not be processed.
    Error {
        /// Human-readable error description.
        message: String,
    },
}

impl ClientFrame {
    /// Creates a Hello frame.
    pub fn hello(handshake: Handshake) -> Self {
        ClientFrame::Hello(handshake)
    }

    /// Creates a Sync frame.
    pub fn sync(message: SyncMessage) -> Self {
        ClientFrame::Sync { message }
    }

    /// Creates a Ping frame.
    pub fn ping(id: u64) -> Self {
        ClientFrame::Ping { id }
    }

    /// Serializes the frame to JSON.
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the frame from JSON.
    pub fn from_json(s: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerFrame {
    /// Creates a Welcome frame.
    pub fn welcome(devices: Vec<Device>) -> Self {
        ServerFrame::Welcome { devices }
    }

    /// Creates a Rejected frame.
    pub fn rejected(reason: impl Into<String>) -> Self {
        ServerFrame::Rejected {
            reason: reason.into(),
        }
    }

    /// Creates a Sync frame.
    pub fn sync(message: SyncMessage) -> Self {
        ServerFrame::Sync { message }
    }

    /// Creates a Pong frame.
    pub fn pong(id: u64) -> Self {
        ServerFrame::Pong { id }
    }

    /// Creates an Error frame.
    pub fn error(message: impl Into<String>) -> Self {
        ServerFrame::Error {
            message: message.into(),
        }
    }

    /// Serializes the frame to JSON.
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the frame from JSON.
    pub fn from_json(s: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
