// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! tandem-relay: WebSocket fan-out relay for multi-device sync.
//!
//! The relay holds no durable state. It admits connections with a `hello`
//! handshake, groups them by account, and rebroadcasts every envelope to all
//! of the account's connections. Presence changes are announced as
//! relay-synthesized `device_status` envelopes.

pub mod error;
pub mod server;
pub mod state;

pub use error::{RelayError, Result};
pub use server::{run, serve};
pub use state::{ConnectionId, RelayState, Session};
