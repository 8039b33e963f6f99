// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connection lifecycle state and reconnect backoff.
//!
//! ```text
//! Disconnected ──connect──► Connecting ──ok──► Connected
//!       ▲                       │                  │
//!       │                     fail               drop
//!       │                       ▼                  ▼
//!       └──disconnect──── Reconnecting(n) ◄────────┘
//!                               │
//!                        retries exhausted
//!                               ▼
//!                            GivenUp
//! ```
//!
//! [`ConnectionState`] is only mutated through its transition methods; the
//! service decides when to call them.

use std::time::Duration;

use crate::config::SyncConfig;

/// Exponential backoff: `min(base * 2^retry_count, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Backoff { base, max }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Backoff::new(
            Duration::from_millis(config.reconnect_base_delay_ms),
            Duration::from_millis(config.reconnect_max_delay_ms),
        )
    }

    /// Delay before the attempt that follows `retry_count` failures.
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        let factor = 1u32.checked_shl(retry_count).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }
}

/// Coarse connection phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Disconnected,
    Connecting,
    Connected,
    /// Waiting out the backoff before attempt `attempt`.
    Reconnecting { attempt: u32 },
    /// Retries exhausted; only an explicit connect leaves this phase.
    GivenUp,
}

/// What to do after a failed or lost connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { attempt: u32, delay: Duration },
    GiveUp { attempts: u32 },
}

/// Observable connection state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionState {
    phase: Phase,
    connection_error: Option<String>,
    last_sync_time: Option<u64>,
    retry_count: u32,
    max_retries: u32,
    connected_since: Option<u64>,
}

impl ConnectionState {
    pub fn new(max_retries: u32) -> Self {
        ConnectionState {
            phase: Phase::Disconnected,
            connection_error: None,
            last_sync_time: None,
            retry_count: 0,
            max_retries,
            connected_since: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_connected(&self) -> bool {
        self.phase == Phase::Connected
    }

    pub fn is_connecting(&self) -> bool {
        self.phase == Phase::Connecting
    }

    /// Last error that ended connecting for good (retries exhausted or
    /// credentials refused).
    pub fn connection_error(&self) -> Option<&str> {
        self.connection_error.as_deref()
    }

    /// Epoch milliseconds of the last connect or dispatched inbound message.
    pub fn last_sync_time(&self) -> Option<u64> {
        self.last_sync_time
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn connected_since(&self) -> Option<u64> {
        self.connected_since
    }

    /// How long the current connection has been up.
    pub fn connected_for(&self, now_ms: u64) -> Option<Duration> {
        self.connected_since
            .map(|since| Duration::from_millis(now_ms.saturating_sub(since)))
    }

    /// Clears retry bookkeeping before a user-initiated connect.
    pub fn reset(&mut self) {
        self.retry_count = 0;
        self.connection_error = None;
        if self.phase == Phase::GivenUp {
            self.phase = Phase::Disconnected;
        }
    }

    pub fn start_attempt(&mut self) {
        self.phase = Phase::Connecting;
    }

    pub fn on_connected(&mut self, now_ms: u64) {
        self.phase = Phase::Connected;
        self.retry_count = 0;
        self.connection_error = None;
        self.last_sync_time = Some(now_ms);
        self.connected_since = Some(now_ms);
    }

    /// The channel went away without a local request.
    pub fn on_lost(&mut self) {
        self.phase = Phase::Disconnected;
        self.connected_since = None;
    }

    /// The relay refused our credentials. No retry follows.
    pub fn on_rejected(&mut self, reason: &str) {
        self.phase = Phase::Disconnected;
        self.connected_since = None;
        self.connection_error = Some(reason.to_string());
    }

    /// Local `disconnect()`.
    pub fn on_disconnect_requested(&mut self) {
        self.phase = Phase::Disconnected;
        self.connected_since = None;
        self.retry_count = 0;
    }

    pub fn mark_synced(&mut self, now_ms: u64) {
        self.last_sync_time = Some(now_ms);
    }

    /// Charges one retry and decides whether another attempt follows.
    pub fn schedule_retry(&mut self, backoff: &Backoff, error: &str) -> RetryDecision {
        if self.retry_count >= self.max_retries {
            return self.give_up(error);
        }
        let delay = backoff.delay_for(self.retry_count);
        self.retry_count += 1;
        if self.retry_count >= self.max_retries {
            return self.give_up(error);
        }
        self.phase = Phase::Reconnecting {
            attempt: self.retry_count,
        };
        RetryDecision::Retry {
            attempt: self.retry_count,
            delay,
        }
    }

    fn give_up(&mut self, error: &str) -> RetryDecision {
        self.phase = Phase::GivenUp;
        self.connected_since = None;
        self.connection_error = Some(error.to_string());
        RetryDecision::GiveUp {
            attempts: self.retry_count,
        }
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
