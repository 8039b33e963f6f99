// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::*;
use tempfile::TempDir;
use yare::parameterized;

#[test]
fn defaults_match_protocol_constants() {
    let config = SyncConfig::default();
    assert_eq!(config.url, "ws://localhost:7890");
    assert_eq!(config.heartbeat_interval_ms, 30_000);
    assert_eq!(config.reconnect_base_delay_ms, 1_000);
    assert_eq!(config.reconnect_max_delay_ms, 5_000);
    assert_eq!(config.reconnect_max_retries, 5);
    assert_eq!(config.connect_timeout_ms, 20_000);
    assert_eq!(config.typing_idle_ms, 2_000);
    assert!(config.sync_on_reconnect);
    assert!(config.validate().is_ok());
}

#[test]
fn empty_toml_yields_defaults() {
    let config = SyncConfig::from_toml_str("").unwrap();
    assert_eq!(config, SyncConfig::default());
}

#[test]
fn partial_toml_overrides_fields() {
    let config = SyncConfig::from_toml_str(
        r#"
        url = "wss://relay.example.com"
        reconnect_max_retries = 8
        sync_on_reconnect = false
        "#,
    )
    .unwrap();

    assert_eq!(config.url, "wss://relay.example.com");
    assert_eq!(config.reconnect_max_retries, 8);
    assert!(!config.sync_on_reconnect);
    assert_eq!(config.heartbeat_interval_ms, 30_000);
}

#[parameterized(
    bad_scheme = { "url = \"http://relay\"", "url" },
    zero_retries = { "reconnect_max_retries = 0", "reconnect_max_retries" },
    zero_queue_retries = { "queue_max_retries = 0", "queue_max_retries" },
    base_over_max = { "reconnect_base_delay_ms = 9000", "reconnect_base_delay_ms" },
    zero_heartbeat = { "heartbeat_interval_ms = 0", "heartbeat_interval_ms" },
)]
fn invalid_values_are_rejected(toml: &str, field: &str) {
    let err = SyncConfig::from_toml_str(toml).unwrap_err();
    assert!(err.to_string().contains(field), "{err}");
}

#[test]
fn malformed_toml_is_parse_error() {
    let err = SyncConfig::from_toml_str("url = ").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn load_from_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("sync.toml");
    std::fs::write(&path, "heartbeat_interval_ms = 15000\n").unwrap();

    let config = SyncConfig::load(&path).unwrap();
    assert_eq!(config.heartbeat_interval_ms, 15_000);
}

#[test]
fn load_missing_file_is_io_error() {
    let temp = TempDir::new().unwrap();
    let err = SyncConfig::load(&temp.path().join("missing.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn background_doubles_heartbeat() {
    let config = SyncConfig::default();
    assert_eq!(config.heartbeat_interval(true), Duration::from_secs(30));
    assert_eq!(config.heartbeat_interval(false), Duration::from_secs(60));
}
