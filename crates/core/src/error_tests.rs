// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use yare::parameterized;

#[parameterized(
    device_type = { Error::InvalidDeviceType("toaster".into()), "toaster" },
    status = { Error::InvalidStatus("asleep".into()), "asleep" },
    message_type = { Error::InvalidMessageType("chat".into()), "conversation_update" },
    input = { Error::InvalidInput("empty user id".into()), "empty user id" },
)]
fn error_display_contains(err: Error, expected: &str) {
    assert!(err.to_string().contains(expected));
}

#[test]
fn error_from_json() {
    let json_err = serde_json::from_str::<()>("invalid").unwrap_err();
    let err: Error = json_err.into();
    assert!(matches!(err, Error::Json(_)));
}
