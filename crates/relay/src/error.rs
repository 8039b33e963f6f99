// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the relay.

use thiserror::Error;

/// Errors raised while serving a connection.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("handshake rejected: {0}")]
    Rejected(String),

    #[error("handshake timed out")]
    HandshakeTimeout,

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;
