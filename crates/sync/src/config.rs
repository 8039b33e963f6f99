// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync client configuration.
//!
//! Configuration is read from a TOML file. Every field has a default, so an
//! empty file (or [`SyncConfig::default`]) yields a working client pointed at
//! a local relay:
//!
//! ```toml
//! url = "wss://relay.example.com"
//! heartbeat_interval_ms = 30000
//! reconnect_max_retries = 5
//! sync_on_reconnect = true
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Configuration for the sync client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// URL of the relay (default: "ws://localhost:7890").
    #[serde(default = "default_url")]
    pub url: String,
    /// Heartbeat ping interval while foregrounded, in milliseconds (default: 30000).
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Max time to wait for a pong before treating the channel as dead,
    /// in milliseconds (default: 10000).
    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,
    /// Heartbeat interval multiplier while backgrounded (default: 2).
    #[serde(default = "default_background_heartbeat_factor")]
    pub background_heartbeat_factor: u32,
    /// Initial reconnect delay in milliseconds (default: 1000).
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    /// Maximum delay between reconnection attempts in milliseconds (default: 5000).
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
    /// Reconnection attempts before giving up (default: 5).
    #[serde(default = "default_reconnect_max_retries")]
    pub reconnect_max_retries: u32,
    /// Max time to wait for a connect attempt in milliseconds (default: 20000).
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Delivery attempts per queued item before it is dropped (default: 3).
    #[serde(default = "default_queue_max_retries")]
    pub queue_max_retries: u32,
    /// Drain the offline queue whenever the channel comes up (default: true).
    #[serde(default = "default_sync_on_reconnect")]
    pub sync_on_reconnect: bool,
    /// Cap on queued conversation messages; oldest are dropped first (default: 100).
    #[serde(default = "default_max_offline_messages")]
    pub max_offline_messages: usize,
    /// Input inactivity before the local typing indicator is cleared,
    /// in milliseconds (default: 2000).
    #[serde(default = "default_typing_idle_ms")]
    pub typing_idle_ms: u64,
    /// How long a remote typing indicator stays visible without a refresh,
    /// in milliseconds (default: 6000).
    #[serde(default = "default_typing_expiry_ms")]
    pub typing_expiry_ms: u64,
    /// Capacity of the event broadcast channel (default: 256).
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_url() -> String {
    "ws://localhost:7890".to_string()
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_heartbeat_timeout_ms() -> u64 {
    10_000
}

fn default_background_heartbeat_factor() -> u32 {
    2
}

fn default_reconnect_base_delay_ms() -> u64 {
    1_000
}

fn default_reconnect_max_delay_ms() -> u64 {
    5_000
}

fn default_reconnect_max_retries() -> u32 {
    5
}

fn default_connect_timeout_ms() -> u64 {
    20_000
}

fn default_queue_max_retries() -> u32 {
    3
}

fn default_sync_on_reconnect() -> bool {
    true
}

fn default_max_offline_messages() -> usize {
    100
}

fn default_typing_idle_ms() -> u64 {
    2_000
}

fn default_typing_expiry_ms() -> u64 {
    6_000
}

fn default_event_capacity() -> usize {
    256
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            url: default_url(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            heartbeat_timeout_ms: default_heartbeat_timeout_ms(),
            background_heartbeat_factor: default_background_heartbeat_factor(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            reconnect_max_retries: default_reconnect_max_retries(),
            connect_timeout_ms: default_connect_timeout_ms(),
            queue_max_retries: default_queue_max_retries(),
            sync_on_reconnect: default_sync_on_reconnect(),
            max_offline_messages: default_max_offline_messages(),
            typing_idle_ms: default_typing_idle_ms(),
            typing_expiry_ms: default_typing_expiry_ms(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl SyncConfig {
    /// Creates a default config pointed at `url`.
    pub fn with_url(url: impl Into<String>) -> Self {
        SyncConfig {
            url: url.into(),
            ..SyncConfig::default()
        }
    }

    /// Loads and validates a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parses and validates TOML config text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: SyncConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(invalid("url", format!("'{}' must be ws:// or wss://", self.url)));
        }
        if self.reconnect_max_retries == 0 {
            return Err(invalid("reconnect_max_retries", "must be at least 1"));
        }
        if self.queue_max_retries == 0 {
            return Err(invalid("queue_max_retries", "must be at least 1"));
        }
        if self.reconnect_base_delay_ms > self.reconnect_max_delay_ms {
            return Err(invalid(
                "reconnect_base_delay_ms",
                "must not exceed reconnect_max_delay_ms",
            ));
        }
        if self.heartbeat_interval_ms == 0 {
            return Err(invalid("heartbeat_interval_ms", "must be non-zero"));
        }
        if self.background_heartbeat_factor == 0 {
            return Err(invalid("background_heartbeat_factor", "must be at least 1"));
        }
        if self.event_capacity == 0 {
            return Err(invalid("event_capacity", "must be at least 1"));
        }
        Ok(())
    }

    /// Heartbeat interval for the given app visibility.
    pub fn heartbeat_interval(&self, foreground: bool) -> Duration {
        let ms = if foreground {
            self.heartbeat_interval_ms
        } else {
            self.heartbeat_interval_ms
                .saturating_mul(u64::from(self.background_heartbeat_factor))
        };
        Duration::from_millis(ms)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn typing_idle(&self) -> Duration {
        Duration::from_millis(self.typing_idle_ms)
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
