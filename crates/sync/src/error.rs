// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the sync client.

use thiserror::Error;

use crate::config::ConfigError;
use crate::storage::StorageError;
use crate::transport::TransportError;

/// Error type for sync client operations.
///
/// Errors map onto the recovery policy: `Authentication` is surfaced to the
/// caller and never retried, `Transport` and `Timeout` are recovered by
/// backoff, `Protocol` frames are discarded.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Credentials missing at connect time or refused by the relay.
    #[error("authentication required: {0}")]
    Authentication(String),

    /// The channel is not connected.
    #[error("not connected to relay")]
    NotConnected,

    /// The connect attempt did not complete in time.
    #[error("connect timed out after {0} ms")]
    Timeout(u64),

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Malformed or unroutable frame or envelope.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Reconnect attempts are exhausted.
    #[error("gave up reconnecting after {attempts} attempts")]
    GivenUp { attempts: u32 },

    /// The background runner is gone.
    #[error("sync runner stopped")]
    Stopped,
}

impl From<tandem_core::Error> for SyncError {
    fn from(err: tandem_core::Error) -> Self {
        SyncError::Protocol(err.to_string())
    }
}

/// Result type for sync client operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
