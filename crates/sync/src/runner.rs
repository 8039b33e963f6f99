// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Runs a [`SyncService`] on its own task.
//!
//! The task owns the service outright. Callers talk to it through a
//! cloneable [`SyncHandle`] which sends [`Command`]s over an mpsc channel and
//! awaits a oneshot reply. Cancelling the runner's token stops the loop,
//! abandoning any command still in flight, and disconnects, cancelling every
//! timer before the task exits.

use tandem_core::{ChatMessage, DeviceStatus, Preferences};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{SyncError, SyncResult};
use crate::events::{EventBus, SyncEvent};
use crate::lifecycle::ConnectionState;
use crate::queue::DrainReport;
use crate::service::{Credentials, Delivery, SyncService, Wake};
use crate::storage::Storage;
use crate::transport::Transport;

const COMMAND_CAPACITY: usize = 32;

/// Requests handled by the runner task.
#[derive(Debug)]
pub enum Command {
    Connect {
        credentials: Credentials,
        reply: oneshot::Sender<SyncResult<()>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    SetForeground {
        foreground: bool,
        reply: oneshot::Sender<SyncResult<()>>,
    },
    BroadcastMessage {
        message: ChatMessage,
        reply: oneshot::Sender<SyncResult<Delivery>>,
    },
    UpdateDeviceStatus {
        status: DeviceStatus,
        reply: oneshot::Sender<SyncResult<Delivery>>,
    },
    UpdatePreferences {
        preferences: Preferences,
        reply: oneshot::Sender<SyncResult<Delivery>>,
    },
    InputChanged {
        text: String,
        reply: oneshot::Sender<SyncResult<()>>,
    },
    DrainQueue {
        reply: oneshot::Sender<SyncResult<DrainReport>>,
    },
    Snapshot {
        reply: oneshot::Sender<SyncSnapshot>,
    },
}

/// Point-in-time copy of the service's read model.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSnapshot {
    pub device_id: String,
    pub state: ConnectionState,
    pub connected_devices: Vec<String>,
    pub typing_devices: Vec<String>,
    pub queued: usize,
}

/// Cloneable front end to a running service.
#[derive(Debug, Clone)]
pub struct SyncHandle {
    commands: mpsc::Sender<Command>,
    events: EventBus,
    cancel: CancellationToken,
}

/// A spawned service task.
#[derive(Debug)]
pub struct SyncRunner {
    handle: SyncHandle,
    task: JoinHandle<()>,
}

impl SyncRunner {
    /// Moves `service` onto a new task.
    pub fn spawn<T, S>(service: SyncService<T, S>) -> Self
    where
        T: Transport + 'static,
        S: Storage + 'static,
    {
        let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
        let cancel = CancellationToken::new();
        let handle = SyncHandle {
            commands: tx,
            events: service.events().clone(),
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(run(service, rx, cancel));
        SyncRunner { handle, task }
    }

    pub fn handle(&self) -> SyncHandle {
        self.handle.clone()
    }

    /// Stops the task and waits for it to disconnect.
    pub async fn shutdown(self) {
        self.handle.cancel.cancel();
        if let Err(e) = self.task.await {
            debug!(error = %e, "sync task ended abnormally");
        }
    }
}

async fn run<T: Transport, S: Storage>(
    mut service: SyncService<T, S>,
    mut commands: mpsc::Receiver<Command>,
    cancel: CancellationToken,
) {
    info!(device_id = %service.device_id(), "sync runner started");
    // Set when the service has no channel and no timer; only a command can
    // give it work again.
    let mut idle = false;

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            command = commands.recv() => match command {
                Some(command) => {
                    idle = false;
                    // A connect may take the whole connect timeout
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = handle_command(&mut service, command) => {}
                    }
                }
                None => break,
            },

            wake = service.wait(), if !idle => {
                if matches!(wake, Wake::Idle) {
                    idle = true;
                } else {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = service.handle(wake) => {}
                    }
                }
            }
        }
    }

    service.shutdown().await;
    info!("sync runner stopped");
}

async fn handle_command<T: Transport, S: Storage>(
    service: &mut SyncService<T, S>,
    command: Command,
) {
    // A dropped reply receiver just means the caller stopped waiting
    match command {
        Command::Connect { credentials, reply } => {
            let _ = reply.send(service.connect(credentials).await);
        }
        Command::Disconnect { reply } => {
            service.disconnect().await;
            let _ = reply.send(());
        }
        Command::SetForeground { foreground, reply } => {
            let _ = reply.send(service.set_foreground(foreground).await);
        }
        Command::BroadcastMessage { message, reply } => {
            let _ = reply.send(service.broadcast_message(message).await);
        }
        Command::UpdateDeviceStatus { status, reply } => {
            let _ = reply.send(service.update_device_status(status).await);
        }
        Command::UpdatePreferences { preferences, reply } => {
            let _ = reply.send(service.update_preferences(preferences).await);
        }
        Command::InputChanged { text, reply } => {
            let _ = reply.send(service.input_changed(&text).await);
        }
        Command::DrainQueue { reply } => {
            let _ = reply.send(service.drain_queue().await);
        }
        Command::Snapshot { reply } => {
            let snapshot = SyncSnapshot {
                device_id: service.device_id().to_string(),
                state: service.state().clone(),
                connected_devices: service.connected_devices(),
                typing_devices: service.typing_devices(),
                queued: service.queued_items().map(|items| items.len()).unwrap_or(0),
            };
            let _ = reply.send(snapshot);
        }
    }
}

impl SyncHandle {
    async fn request<R>(
        &self,
        make: impl FnOnce(oneshot::Sender<R>) -> Command,
    ) -> SyncResult<R> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| SyncError::Stopped)?;
        rx.await.map_err(|_| SyncError::Stopped)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub async fn connect(&self, credentials: Credentials) -> SyncResult<()> {
        self.request(|reply| Command::Connect { credentials, reply })
            .await?
    }

    pub async fn disconnect(&self) -> SyncResult<()> {
        self.request(|reply| Command::Disconnect { reply }).await
    }

    pub async fn set_foreground(&self, foreground: bool) -> SyncResult<()> {
        self.request(|reply| Command::SetForeground { foreground, reply })
            .await?
    }

    pub async fn broadcast_message(&self, message: ChatMessage) -> SyncResult<Delivery> {
        self.request(|reply| Command::BroadcastMessage { message, reply })
            .await?
    }

    pub async fn update_device_status(&self, status: DeviceStatus) -> SyncResult<Delivery> {
        self.request(|reply| Command::UpdateDeviceStatus { status, reply })
            .await?
    }

    pub async fn update_preferences(&self, preferences: Preferences) -> SyncResult<Delivery> {
        self.request(|reply| Command::UpdatePreferences { preferences, reply })
            .await?
    }

    pub async fn input_changed(&self, text: impl Into<String>) -> SyncResult<()> {
        let text = text.into();
        self.request(|reply| Command::InputChanged { text, reply })
            .await?
    }

    pub async fn drain_queue(&self) -> SyncResult<DrainReport> {
        self.request(|reply| Command::DrainQueue { reply }).await?
    }

    pub async fn snapshot(&self) -> SyncResult<SyncSnapshot> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Asks the runner to stop without waiting for it.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
