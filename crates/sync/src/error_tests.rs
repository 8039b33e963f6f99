// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use yare::parameterized;

#[parameterized(
    auth = { SyncError::Authentication("missing token".into()), "missing token" },
    not_connected = { SyncError::NotConnected, "not connected" },
    timeout = { SyncError::Timeout(20_000), "20000 ms" },
    given_up = { SyncError::GivenUp { attempts: 5 }, "5 attempts" },
)]
fn sync_error_display_contains(err: SyncError, expected: &str) {
    assert!(err.to_string().contains(expected));
}

#[test]
fn sync_error_from_transport() {
    let err: SyncError = TransportError::ConnectionClosed.into();
    assert!(matches!(err, SyncError::Transport(_)));
}

#[test]
fn sync_error_from_core_is_protocol() {
    let core_err = tandem_core::Error::InvalidMessageType("chat".into());
    let err: SyncError = core_err.into();
    assert!(matches!(err, SyncError::Protocol(_)));
}
