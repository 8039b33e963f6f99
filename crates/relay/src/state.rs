// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Relay state management.
//!
//! Connections are grouped by account. Each account owns a broadcast channel
//! and a roster of the devices connected right now.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info};

use tandem_core::{
    ClockSource, Device, DeviceStatus, Handshake, ServerFrame, SyncMessage, SyncPayload,
    SystemClock,
};

use crate::error::{RelayError, Result};

const ACCOUNT_CHANNEL_CAPACITY: usize = 1024;

/// Identifies one accepted connection within the relay.
pub type ConnectionId = u64;

/// Shared relay state.
#[derive(Clone)]
pub struct RelayState {
    inner: Arc<RelayStateInner>,
}

struct RelayStateInner {
    /// Shared token every handshake must present, if set.
    token: Option<String>,
    accounts: Mutex<HashMap<String, Account>>,
    next_connection: AtomicU64,
    clock: Arc<dyn ClockSource>,
}

struct Account {
    tx: broadcast::Sender<ServerFrame>,
    devices: HashMap<ConnectionId, Device>,
}

impl Account {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(ACCOUNT_CHANNEL_CAPACITY);
        Account {
            tx,
            devices: HashMap::new(),
        }
    }
}

/// A connection admitted to an account.
pub struct Session {
    pub id: ConnectionId,
    pub user_id: String,
    pub device: Device,
    /// Devices of the same account that were connected before this one.
    pub roster: Vec<Device>,
    pub rx: broadcast::Receiver<ServerFrame>,
}

impl RelayState {
    pub fn new(token: Option<String>) -> Self {
        Self::with_clock(token, Arc::new(SystemClock))
    }

    /// Creates a relay state that stamps synthesized envelopes from `clock`.
    pub fn with_clock(token: Option<String>, clock: Arc<dyn ClockSource>) -> Self {
        RelayState {
            inner: Arc::new(RelayStateInner {
                token,
                accounts: Mutex::new(HashMap::new()),
                next_connection: AtomicU64::new(1),
                clock,
            }),
        }
    }

    /// Checks a handshake against the relay's admission policy.
    pub fn authorize(&self, handshake: &Handshake) -> Result<()> {
        handshake
            .validate()
            .map_err(|e| RelayError::Rejected(e.to_string()))?;
        match &self.inner.token {
            Some(token) if *token != handshake.token => {
                Err(RelayError::Rejected("invalid token".to_string()))
            }
            _ => Ok(()),
        }
    }

    /// Admits a connection and announces it to the account.
    ///
    /// The new connection is subscribed before the `online` status goes
    /// out, so it sees its own announcement like any other envelope.
    pub async fn join(&self, handshake: &Handshake) -> Result<Session> {
        self.authorize(handshake)?;

        let id = self.inner.next_connection.fetch_add(1, Ordering::Relaxed);
        let device = handshake.device();
        let mut accounts = self.inner.accounts.lock().await;
        let account = accounts
            .entry(handshake.user_id.clone())
            .or_insert_with(Account::new);

        let mut roster: Vec<Device> = account
            .devices
            .values()
            .filter(|d| d.device_id != device.device_id)
            .cloned()
            .collect();
        roster.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        roster.dedup_by(|a, b| a.device_id == b.device_id);

        let rx = account.tx.subscribe();
        account.devices.insert(id, device.clone());
        info!(
            user_id = %handshake.user_id,
            device_id = %device.device_id,
            connections = account.devices.len(),
            "device joined"
        );

        let status = self.status_frame(&handshake.user_id, &device, DeviceStatus::Online);
        let _ = account.tx.send(status);

        Ok(Session {
            id,
            user_id: handshake.user_id.clone(),
            device,
            roster,
            rx,
        })
    }

    /// Removes a connection and announces the device offline.
    pub async fn leave(&self, user_id: &str, id: ConnectionId) {
        let mut accounts = self.inner.accounts.lock().await;
        let Some(account) = accounts.get_mut(user_id) else {
            return;
        };
        let Some(device) = account.devices.remove(&id) else {
            return;
        };
        info!(user_id, device_id = %device.device_id, "device left");

        let still_connected = account
            .devices
            .values()
            .any(|d| d.device_id == device.device_id);
        if !still_connected {
            let status = self.status_frame(user_id, &device, DeviceStatus::Offline);
            let _ = account.tx.send(status);
        }
        if account.devices.is_empty() {
            accounts.remove(user_id);
        }
    }

    /// Fans an envelope out to every connection of its account.
    pub async fn publish(&self, message: SyncMessage) {
        let accounts = self.inner.accounts.lock().await;
        if let Some(account) = accounts.get(message.user_id()) {
            debug!(
                user_id = %message.user_id(),
                device_id = %message.device_id(),
                message_type = %message.message_type(),
                "fan out"
            );
            let _ = account.tx.send(ServerFrame::sync(message));
        }
    }

    /// Devices currently connected for an account.
    pub async fn devices(&self, user_id: &str) -> Vec<Device> {
        let accounts = self.inner.accounts.lock().await;
        let mut devices: Vec<Device> = accounts
            .get(user_id)
            .map(|a| a.devices.values().cloned().collect())
            .unwrap_or_default();
        devices.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        devices
    }

    /// Number of accounts with at least one connection.
    pub async fn account_count(&self) -> usize {
        self.inner.accounts.lock().await.len()
    }

    fn status_frame(&self, user_id: &str, device: &Device, status: DeviceStatus) -> ServerFrame {
        let payload = SyncPayload::device_status(status, Some(device.device_type));
        ServerFrame::sync(SyncMessage::new(
            payload,
            user_id,
            device.device_id.clone(),
            self.inner.clock.as_ref(),
        ))
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
