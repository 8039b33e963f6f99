// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Device model: one physical or logical endpoint of an account.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Kind of client surface a device runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Mobile,
    Desktop,
    Wearable,
    Web,
}

impl DeviceType {
    /// Returns the string representation used on the wire and in device ids.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Mobile => "mobile",
            DeviceType::Desktop => "desktop",
            DeviceType::Wearable => "wearable",
            DeviceType::Web => "web",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mobile" => Ok(DeviceType::Mobile),
            "desktop" => Ok(DeviceType::Desktop),
            "wearable" => Ok(DeviceType::Wearable),
            "web" => Ok(DeviceType::Web),
            _ => Err(Error::InvalidDeviceType(s.to_string())),
        }
    }
}

/// Last-known reachability of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Online,
    Offline,
    /// Connected but idle (backgrounded app, sleeping desktop).
    Away,
}

impl DeviceStatus {
    /// Returns the string representation used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Online => "online",
            DeviceStatus::Offline => "offline",
            DeviceStatus::Away => "away",
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DeviceStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "online" => Ok(DeviceStatus::Online),
            "offline" => Ok(DeviceStatus::Offline),
            "away" => Ok(DeviceStatus::Away),
            _ => Err(Error::InvalidStatus(s.to_string())),
        }
    }
}

/// Feature flags a device advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    VoiceInput,
    FileAccess,
    Notifications,
    Haptics,
    Camera,
}

impl Capability {
    /// Returns the string representation used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::VoiceInput => "voice_input",
            Capability::FileAccess => "file_access",
            Capability::Notifications => "notifications",
            Capability::Haptics => "haptics",
            Capability::Camera => "camera",
        }
    }
}

impl FromStr for Capability {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "voice_input" => Ok(Capability::VoiceInput),
            "file_access" => Ok(Capability::FileAccess),
            "notifications" => Ok(Capability::Notifications),
            "haptics" => Ok(Capability::Haptics),
            "camera" => Ok(Capability::Camera),
            _ => Err(Error::InvalidCapability(s.to_string())),
        }
    }
}

/// One endpoint of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Opaque id, generated once per install and persisted.
    pub device_id: String,
    pub device_type: DeviceType,
    #[serde(default)]
    pub capabilities: BTreeSet<Capability>,
}

impl Device {
    /// Creates a device with no advertised capabilities.
    pub fn new(device_id: impl Into<String>, device_type: DeviceType) -> Self {
        Device {
            device_id: device_id.into(),
            device_type,
            capabilities: BTreeSet::new(),
        }
    }

    /// Adds a capability flag.
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    /// Returns true if the device advertises the given capability.
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

#[cfg(test)]
#[path = "device_tests.rs"]
mod tests;
