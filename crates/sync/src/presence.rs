// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Presence and typing aggregation for the account's other devices.
//!
//! Status and typing updates from this device are ignored. Typing entries
//! carry an expiry so a peer that vanished mid-sentence does not stay
//! "typing" forever; they are pruned on every mutation and filtered on every
//! read.

use std::collections::BTreeMap;

use tandem_core::{Device, DeviceStatus};

#[derive(Debug, Clone)]
pub struct PresenceSet {
    local_device_id: String,
    devices: BTreeMap<String, DeviceStatus>,
    /// device id -> epoch ms at which the indicator lapses
    typing: BTreeMap<String, u64>,
    typing_expiry_ms: u64,
}

impl PresenceSet {
    pub fn new(local_device_id: impl Into<String>, typing_expiry_ms: u64) -> Self {
        PresenceSet {
            local_device_id: local_device_id.into(),
            devices: BTreeMap::new(),
            typing: BTreeMap::new(),
            typing_expiry_ms,
        }
    }

    /// Replaces the roster with the relay's list of connected peers.
    pub fn seed(&mut self, devices: &[Device]) {
        self.devices = devices
            .iter()
            .filter(|d| d.device_id != self.local_device_id)
            .map(|d| (d.device_id.clone(), DeviceStatus::Online))
            .collect();
        let devices = &self.devices;
        self.typing.retain(|id, _| devices.contains_key(id));
    }

    /// Applies a `device_status` update. Returns false if it was ignored.
    pub fn apply_status(&mut self, device_id: &str, status: DeviceStatus) -> bool {
        if device_id == self.local_device_id {
            return false;
        }
        match status {
            DeviceStatus::Offline => {
                self.devices.remove(device_id);
                self.typing.remove(device_id);
            }
            DeviceStatus::Online | DeviceStatus::Away => {
                self.devices.insert(device_id.to_string(), status);
            }
        }
        true
    }

    /// Applies a `typing_indicator` update. Returns false if it was ignored.
    pub fn apply_typing(&mut self, device_id: &str, is_typing: bool, now_ms: u64) -> bool {
        if device_id == self.local_device_id {
            return false;
        }
        self.prune(now_ms);
        if is_typing {
            self.typing.insert(
                device_id.to_string(),
                now_ms.saturating_add(self.typing_expiry_ms),
            );
        } else {
            self.typing.remove(device_id);
        }
        true
    }

    /// Drops typing entries that have lapsed. Returns the ids dropped.
    pub fn prune(&mut self, now_ms: u64) -> Vec<String> {
        let expired: Vec<String> = self
            .typing
            .iter()
            .filter(|(_, expires_at)| **expires_at <= now_ms)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            self.typing.remove(id);
        }
        expired
    }

    /// Drops everything; used when our own channel goes down.
    pub fn clear(&mut self) {
        self.devices.clear();
        self.typing.clear();
    }

    pub fn typing_devices(&self, now_ms: u64) -> Vec<String> {
        self.typing
            .iter()
            .filter(|(_, expires_at)| **expires_at > now_ms)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn has_typing_devices(&self, now_ms: u64) -> bool {
        self.typing.values().any(|expires_at| *expires_at > now_ms)
    }

    /// Listed peers, online or away.
    pub fn connected_devices(&self) -> Vec<String> {
        self.devices.keys().cloned().collect()
    }

    pub fn status(&self, device_id: &str) -> Option<DeviceStatus> {
        self.devices.get(device_id).copied()
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }
}

#[cfg(test)]
#[path = "presence_tests.rs"]
mod tests;
