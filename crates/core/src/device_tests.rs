// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use yare::parameterized;

#[parameterized(
    mobile = { "mobile", DeviceType::Mobile },
    desktop = { "desktop", DeviceType::Desktop },
    wearable = { "wearable", DeviceType::Wearable },
    web = { "web", DeviceType::Web },
    upper = { "DESKTOP", DeviceType::Desktop },
)]
fn device_type_from_str_valid(input: &str, expected: DeviceType) {
    assert_eq!(input.parse::<DeviceType>().unwrap(), expected);
}

#[parameterized(
    invalid = { "toaster" },
    empty = { "" },
)]
fn device_type_from_str_invalid(input: &str) {
    assert!(input.parse::<DeviceType>().is_err());
}

#[parameterized(
    online = { "online", DeviceStatus::Online },
    offline = { "offline", DeviceStatus::Offline },
    away = { "Away", DeviceStatus::Away },
)]
fn device_status_from_str_valid(input: &str, expected: DeviceStatus) {
    assert_eq!(input.parse::<DeviceStatus>().unwrap(), expected);
}

#[parameterized(
    snake = { "voice_input", Capability::VoiceInput },
    kebab = { "file-access", Capability::FileAccess },
    haptics = { "haptics", Capability::Haptics },
)]
fn capability_from_str_valid(input: &str, expected: Capability) {
    assert_eq!(input.parse::<Capability>().unwrap(), expected);
}

#[test]
fn device_json_uses_camel_case() {
    let device = Device::new("desktop-0a1b", DeviceType::Desktop)
        .with_capability(Capability::FileAccess)
        .with_capability(Capability::VoiceInput);

    let json = serde_json::to_string(&device).unwrap();
    assert!(json.contains("\"deviceId\":\"desktop-0a1b\""));
    assert!(json.contains("\"deviceType\":\"desktop\""));
    assert!(json.contains("\"voice_input\""));

    let parsed: Device = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, device);
}

#[test]
fn device_capabilities_default_to_empty() {
    let parsed: Device =
        serde_json::from_str(r#"{"deviceId":"w-1","deviceType":"wearable"}"#).unwrap();
    assert!(parsed.capabilities.is_empty());
    assert!(!parsed.has_capability(Capability::Haptics));
}
