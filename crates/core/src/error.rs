// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for tandem-core operations.

use thiserror::Error;

/// All possible errors that can occur in tandem-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid device type: '{0}'\n  hint: valid types are: mobile, desktop, wearable, web")]
    InvalidDeviceType(String),

    #[error("invalid device status: '{0}'\n  hint: valid statuses are: online, offline, away")]
    InvalidStatus(String),

    #[error("invalid capability: '{0}'")]
    InvalidCapability(String),

    #[error("invalid message type: '{0}'\n  hint: valid types are: conversation_update, device_status, typing_indicator, user_preference")]
    InvalidMessageType(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for tandem-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
