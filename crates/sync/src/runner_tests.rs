// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::config::SyncConfig;
use crate::storage::MemoryStorage;
use crate::test_helpers::{chat, envelope_from};
use crate::transport_tests::{MockConnect, MockRemote, MockTransport};
use tandem_core::{ClockSource, Device, DeviceType, ManualClock, SyncPayload};

fn spawn() -> (SyncRunner, MockRemote) {
    let (transport, remote) = MockTransport::new();
    let service = SyncService::new(
        SyncConfig::default(),
        Device::new("d1", DeviceType::Desktop),
        transport,
        MemoryStorage::new(),
        Arc::new(ManualClock::new(5_000)) as Arc<dyn ClockSource>,
    )
    .unwrap();
    (SyncRunner::spawn(service), remote)
}

fn credentials() -> Credentials {
    Credentials::new("secret", "user-1")
}

async fn next_event(rx: &mut broadcast::Receiver<SyncEvent>) -> SyncEvent {
    tokio::time::timeout(Duration::from_secs(60), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

#[tokio::test(start_paused = true)]
async fn connect_through_handle() {
    let (runner, remote) = spawn();
    let handle = runner.handle();
    let mut events = handle.subscribe();

    handle.connect(credentials()).await.unwrap();

    assert_eq!(
        next_event(&mut events).await,
        SyncEvent::Connected { devices: vec![] }
    );
    assert!(remote.is_connected());
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.device_id, "d1");
    assert!(snapshot.state.is_connected());
    assert_eq!(snapshot.queued, 0);

    runner.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn inbound_frames_reach_subscribers() {
    let (runner, remote) = spawn();
    let handle = runner.handle();
    let mut events = handle.subscribe();
    handle.connect(credentials()).await.unwrap();
    next_event(&mut events).await;

    let message = envelope_from("d2", SyncPayload::conversation(chat("m1", "hi")));
    remote.push_sync(message.clone());

    assert_eq!(
        next_event(&mut events).await,
        SyncEvent::MessageReceived(message)
    );
    runner.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn timers_run_in_background() {
    let (runner, remote) = spawn();
    let handle = runner.handle();
    handle.connect(credentials()).await.unwrap();

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(remote.sent_pings(), vec![1]);

    runner.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn idle_runner_wakes_for_commands() {
    let (runner, remote) = spawn();
    let handle = runner.handle();

    // Nothing to do yet; the loop must still accept commands
    tokio::time::sleep(Duration::from_secs(5)).await;
    let delivery = handle.broadcast_message(chat("m1", "queued")).await.unwrap();
    assert_eq!(delivery, Delivery::Queued);
    assert_eq!(handle.snapshot().await.unwrap().queued, 1);

    handle.connect(credentials()).await.unwrap();
    assert_eq!(remote.sent_messages().len(), 1);
    assert_eq!(handle.snapshot().await.unwrap().queued, 0);

    runner.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn producer_commands_round_trip() {
    let (runner, remote) = spawn();
    let handle = runner.handle();
    handle.connect(credentials()).await.unwrap();

    handle.update_device_status(DeviceStatus::Away).await.unwrap();
    handle.update_preferences(Preferences::new()).await.unwrap();
    handle.input_changed("hello").await.unwrap();
    handle.set_foreground(false).await.unwrap();
    let report = handle.drain_queue().await.unwrap();

    assert_eq!(report, DrainReport::default());
    assert_eq!(remote.sent_messages().len(), 3);
    runner.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_disconnects_and_stops_handles() {
    let (runner, remote) = spawn();
    let handle = runner.handle();
    handle.connect(credentials()).await.unwrap();

    runner.shutdown().await;

    assert!(!remote.is_connected());
    assert!(handle.is_stopped());
    assert!(matches!(
        handle.connect(credentials()).await,
        Err(SyncError::Stopped)
    ));
}

#[tokio::test(start_paused = true)]
async fn disconnect_through_handle() {
    let (runner, remote) = spawn();
    let handle = runner.handle();
    handle.connect(credentials()).await.unwrap();
    handle.disconnect().await.unwrap();

    assert!(!remote.is_connected());
    assert!(!handle.snapshot().await.unwrap().state.is_connected());
    runner.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_interrupts_hanging_connect() {
    let (runner, remote) = spawn();
    remote.script_connect(MockConnect::Hang);
    let handle = runner.handle();
    let pending = tokio::spawn({
        let handle = handle.clone();
        async move { handle.connect(credentials()).await }
    });

    // Let the runner start the attempt
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(remote.connect_attempts(), 1);

    let start = tokio::time::Instant::now();
    runner.shutdown().await;
    assert_eq!(tokio::time::Instant::now(), start);
    assert!(matches!(pending.await.unwrap(), Err(SyncError::Stopped)));
}
