// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end tests: sync clients talking to a live relay.

#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use tandem_core::{
    ChatMessage, ClientFrame, Device, DeviceType, Handshake, MessageRole, ServerFrame,
    SystemClock,
};
use tandem_relay::RelayState;
use tandem_sync::{
    Credentials, Delivery, MemoryStorage, SyncConfig, SyncError, SyncEvent, SyncHandle,
    SyncRunner, SyncService, WebSocketTransport,
};

async fn start_relay(token: Option<&str>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = RelayState::new(token.map(str::to_string));
    tokio::spawn(tandem_relay::serve(listener, state));
    format!("ws://{}", addr)
}

fn client(url: &str, device_id: &str) -> SyncRunner {
    let service = SyncService::new(
        SyncConfig::with_url(url),
        Device::new(device_id, DeviceType::Desktop),
        WebSocketTransport::new(),
        MemoryStorage::new(),
        Arc::new(SystemClock),
    )
    .unwrap();
    SyncRunner::spawn(service)
}

fn chat(id: &str) -> ChatMessage {
    ChatMessage::new(id, MessageRole::User, "hello from d1", chrono::Utc::now())
}

/// Events received within `window`.
async fn collect(rx: &mut broadcast::Receiver<SyncEvent>, window: Duration) -> Vec<SyncEvent> {
    let mut events = Vec::new();
    let deadline = tokio::time::Instant::now() + window;
    while let Ok(Ok(event)) = tokio::time::timeout_at(deadline, rx.recv()).await {
        events.push(event);
    }
    events
}

fn received_ids(events: &[SyncEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            SyncEvent::MessageReceived(message) => match message.payload() {
                tandem_core::SyncPayload::ConversationUpdate(update) => {
                    Some(update.message.id.clone())
                }
                _ => None,
            },
            _ => None,
        })
        .collect()
}

async fn connect(handle: &SyncHandle, user: &str) {
    handle
        .connect(Credentials::new("secret", user))
        .await
        .expect("connect");
}

#[tokio::test]
async fn message_reaches_other_device_exactly_once() {
    let url = start_relay(None).await;
    let d1 = client(&url, "d1");
    let d2 = client(&url, "d2");
    let (h1, h2) = (d1.handle(), d2.handle());
    let mut d1_events = h1.subscribe();
    let mut d2_events = h2.subscribe();

    connect(&h1, "user-1").await;
    connect(&h2, "user-1").await;

    let delivery = h1.broadcast_message(chat("m1")).await.unwrap();
    assert_eq!(delivery, Delivery::Sent);

    let d2_seen = collect(&mut d2_events, Duration::from_millis(500)).await;
    assert_eq!(received_ids(&d2_seen), vec!["m1".to_string()]);

    // d1 never re-adds its own message from the echo
    let d1_seen = collect(&mut d1_events, Duration::from_millis(200)).await;
    assert!(received_ids(&d1_seen).is_empty());

    d1.shutdown().await;
    d2.shutdown().await;
}

#[tokio::test]
async fn presence_follows_connections() {
    let url = start_relay(None).await;
    let d1 = client(&url, "d1");
    let d2 = client(&url, "d2");
    let h1 = d1.handle();
    let mut d1_events = h1.subscribe();

    connect(&h1, "user-1").await;
    connect(&d2.handle(), "user-1").await;

    let seen = collect(&mut d1_events, Duration::from_millis(300)).await;
    assert!(seen.iter().any(|e| matches!(
        e,
        SyncEvent::DeviceStatusUpdate { device_id, .. } if device_id == "d2"
    )));
    assert_eq!(
        h1.snapshot().await.unwrap().connected_devices,
        vec!["d2".to_string()]
    );

    d2.shutdown().await;
    collect(&mut d1_events, Duration::from_millis(300)).await;
    assert!(h1.snapshot().await.unwrap().connected_devices.is_empty());

    d1.shutdown().await;
}

#[tokio::test]
async fn bad_token_is_rejected_without_retry() {
    let url = start_relay(Some("right")).await;
    let runner = client(&url, "d1");
    let handle = runner.handle();
    let mut events = handle.subscribe();

    let result = handle.connect(Credentials::new("wrong", "user-1")).await;
    assert!(matches!(result, Err(SyncError::Authentication(_))));

    let seen = collect(&mut events, Duration::from_millis(200)).await;
    assert!(seen
        .iter()
        .any(|e| matches!(e, SyncEvent::AuthenticationFailed { .. })));
    assert!(!seen
        .iter()
        .any(|e| matches!(e, SyncEvent::ReconnectScheduled { .. })));

    runner.shutdown().await;
}

#[tokio::test]
async fn fan_out_stays_within_account() {
    let url = start_relay(None).await;
    let mine = client(&url, "d1");
    let theirs = client(&url, "d9");
    let mut their_events = theirs.handle().subscribe();

    connect(&mine.handle(), "user-1").await;
    connect(&theirs.handle(), "user-2").await;

    mine.handle().broadcast_message(chat("m1")).await.unwrap();

    let seen = collect(&mut their_events, Duration::from_millis(300)).await;
    assert!(received_ids(&seen).is_empty());
    assert!(theirs.handle().snapshot().await.unwrap().connected_devices.is_empty());

    mine.shutdown().await;
    theirs.shutdown().await;
}

/// Helper to spawn a relay process and clean it up on drop.
struct RelayProcess {
    child: Child,
    port: u16,
}

impl RelayProcess {
    fn spawn() -> Self {
        // Reserve a free port, then hand it to the child
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .and_then(|l| l.local_addr())
            .map(|a| a.port())
            .expect("reserve port");

        let child = Command::new(env!("CARGO_BIN_EXE_tandem-relay"))
            .arg("--bind")
            .arg(format!("127.0.0.1:{}", port))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn relay process");

        RelayProcess { child, port }
    }

    fn ws_url(&self) -> String {
        format!("ws://127.0.0.1:{}", self.port)
    }
}

impl Drop for RelayProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[tokio::test]
async fn test_binary_lifecycle() {
    let relay = RelayProcess::spawn();

    // Retry while the process starts; CI runners can be slow
    let mut ws_stream = None;
    for _ in 0..20 {
        if let Ok(Ok((stream, _))) =
            tokio::time::timeout(Duration::from_millis(500), connect_async(&relay.ws_url())).await
        {
            ws_stream = Some(stream);
            break;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    let ws_stream = ws_stream.expect("should connect to relay within retries");
    let (mut sink, mut stream) = ws_stream.split();

    let hello = ClientFrame::hello(Handshake::new("t", "user-1", "d1", DeviceType::Web));
    sink.send(Message::Text(hello.to_json().unwrap().into()))
        .await
        .expect("send hello");
    sink.send(Message::Text(ClientFrame::ping(12345).to_json().unwrap().into()))
        .await
        .expect("send ping");

    let mut frames = Vec::new();
    while frames.len() < 3 {
        match tokio::time::timeout(Duration::from_secs(5), stream.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                frames.push(ServerFrame::from_json(&text).unwrap());
            }
            Ok(Some(Ok(_))) => continue,
            other => panic!("expected frames, got {:?}", other),
        }
    }

    assert!(matches!(frames[0], ServerFrame::Welcome { .. }));
    assert!(frames.contains(&ServerFrame::pong(12345)));
}
