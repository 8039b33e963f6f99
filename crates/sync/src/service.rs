// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The sync service: one device's end of the protocol.
//!
//! A [`SyncService`] owns the transport, connection state, offline queue,
//! presence set, typing debouncer and the named timers. Nothing in it is
//! shared; every mutation goes through `&mut self`, driven either by a
//! producer call or by [`SyncService::step`], which waits for the next
//! inbound frame or timer and handles it.
//!
//! ```text
//!   producer calls ─┐
//!                   ▼
//!  transport ──► SyncService ──► EventBus ──► subscribers
//!   timers   ──►    │
//!                   ▼
//!             OfflineQueue (Storage)
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tandem_core::{
    ChatMessage, ClientFrame, ClockSource, Device, DeviceStatus, DeviceType, Handshake,
    Preferences, ServerFrame, SyncMessage, SyncPayload,
};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::events::{EventBus, SyncEvent};
use crate::identity::{generate_item_id, load_or_create_device_id};
use crate::lifecycle::{Backoff, ConnectionState, Phase, RetryDecision};
use crate::presence::PresenceSet;
use crate::protocol::{Dispatcher, Route};
use crate::queue::{Deliver, DeliveryError, DrainReport, OfflineQueue, OfflineQueueItem};
use crate::storage::{Storage, SyncStore};
use crate::timers::{TimerKind, Timers};
use crate::transport::{Transport, TransportError, TransportResult};
use crate::typing::TypingDebouncer;

/// Account credentials presented in the handshake.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
    pub user_id: String,
}

impl Credentials {
    pub fn new(token: impl Into<String>, user_id: impl Into<String>) -> Self {
        Credentials {
            token: token.into(),
            user_id: user_id.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// How an outbound event was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// Persisted for a later drain.
    Queued,
}

/// What woke the service up.
#[derive(Debug)]
pub enum Wake {
    Frame(TransportResult<Option<ServerFrame>>),
    Timer(TimerKind),
    /// No channel and no timer armed; nothing will happen until a producer
    /// call.
    Idle,
}

pub struct SyncService<T, S> {
    config: SyncConfig,
    device: Device,
    transport: T,
    queue: OfflineQueue<S>,
    state: ConnectionState,
    backoff: Backoff,
    dispatcher: Dispatcher,
    presence: PresenceSet,
    typing: TypingDebouncer,
    timers: Timers,
    events: EventBus,
    clock: Arc<dyn ClockSource>,
    credentials: Option<Credentials>,
    foreground: bool,
    next_ping_id: u64,
    pending_ping: Option<u64>,
}

impl<T: Transport, S: Storage> SyncService<T, S> {
    /// Creates a service for `device`. Nothing is sent until [`connect`].
    ///
    /// [`connect`]: SyncService::connect
    pub fn new(
        config: SyncConfig,
        device: Device,
        transport: T,
        storage: S,
        clock: Arc<dyn ClockSource>,
    ) -> SyncResult<Self> {
        config.validate()?;
        let store = SyncStore::new(storage, config.max_offline_messages);
        Ok(SyncService {
            state: ConnectionState::new(config.reconnect_max_retries),
            backoff: Backoff::from_config(&config),
            dispatcher: Dispatcher::new(device.device_id.clone()),
            presence: PresenceSet::new(device.device_id.clone(), config.typing_expiry_ms),
            typing: TypingDebouncer::new(config.typing_idle()),
            timers: Timers::new(),
            events: EventBus::new(config.event_capacity),
            queue: OfflineQueue::new(store),
            config,
            device,
            transport,
            clock,
            credentials: None,
            foreground: true,
            next_ping_id: 1,
            pending_ping: None,
        })
    }

    /// Creates a service using the device id persisted in `storage`,
    /// generating one on first launch.
    pub fn open(
        config: SyncConfig,
        device_type: DeviceType,
        transport: T,
        storage: S,
        clock: Arc<dyn ClockSource>,
    ) -> SyncResult<Self> {
        let store = SyncStore::new(storage, config.max_offline_messages);
        let device_id = load_or_create_device_id(&store, device_type)?;
        Self::new(
            config,
            Device::new(device_id, device_type),
            transport,
            store.into_storage(),
            clock,
        )
    }

    // Read model

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn device_id(&self) -> &str {
        &self.device.device_id
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    pub fn is_foreground(&self) -> bool {
        self.foreground
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn presence(&self) -> &PresenceSet {
        &self.presence
    }

    pub fn typing_devices(&self) -> Vec<String> {
        self.presence.typing_devices(self.clock.now_ms())
    }

    pub fn has_typing_devices(&self) -> bool {
        self.presence.has_typing_devices(self.clock.now_ms())
    }

    pub fn connected_devices(&self) -> Vec<String> {
        self.presence.connected_devices()
    }

    pub fn device_count(&self) -> usize {
        self.presence.device_count()
    }

    pub fn queued_items(&self) -> SyncResult<Vec<OfflineQueueItem>> {
        Ok(self.queue.items()?)
    }

    /// When `kind` next fires, if armed.
    pub fn timer_deadline(&self, kind: TimerKind) -> Option<Instant> {
        self.timers.deadline(kind)
    }

    // Lifecycle

    /// Opens the channel with `credentials`.
    ///
    /// Empty credentials fail fast with [`SyncError::Authentication`] and are
    /// never retried. A transport failure schedules a reconnect and is also
    /// returned. Calling this while connecting or connected does nothing.
    pub async fn connect(&mut self, credentials: Credentials) -> SyncResult<()> {
        let handshake = self.handshake(&credentials);
        if let Err(e) = handshake.validate() {
            let reason = e.to_string();
            warn!(reason = %reason, "refusing to connect");
            self.events.emit(SyncEvent::AuthenticationFailed {
                reason: reason.clone(),
            });
            return Err(SyncError::Authentication(reason));
        }
        if self.state.is_connected() || self.state.is_connecting() {
            return Ok(());
        }

        self.credentials = Some(credentials);
        self.state.reset();
        self.timers.cancel(TimerKind::Reconnect);
        self.attempt_connect().await
    }

    /// Closes the channel. No reconnect follows.
    pub async fn disconnect(&mut self) {
        let was_connected = self.state.is_connected();
        self.timers.cancel_all();
        self.typing.reset();
        self.pending_ping = None;
        if let Err(e) = self.transport.disconnect().await {
            debug!(error = %e, "error closing transport");
        }
        self.state.on_disconnect_requested();
        self.presence.clear();
        // Only an explicit connect may open the channel again
        self.credentials = None;
        info!("disconnected");
        if was_connected {
            self.events.emit(SyncEvent::Disconnected {
                reason: "disconnected by client".to_string(),
            });
        }
    }

    /// Records app visibility. Coming to the foreground while disconnected
    /// reconnects at once, skipping any pending backoff.
    pub async fn set_foreground(&mut self, foreground: bool) -> SyncResult<()> {
        if self.foreground == foreground {
            return Ok(());
        }
        self.foreground = foreground;
        debug!(foreground, "visibility changed");

        if self.state.is_connected() {
            self.arm_heartbeat();
            return Ok(());
        }
        if !foreground || self.credentials.is_none() || self.state.is_connecting() {
            return Ok(());
        }

        self.timers.cancel(TimerKind::Reconnect);
        if self.state.phase() == Phase::GivenUp {
            self.state.reset();
        }
        match self.attempt_connect().await {
            Ok(()) | Err(SyncError::Transport(_)) | Err(SyncError::Timeout(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Shuts the service down, cancelling every timer.
    pub async fn shutdown(&mut self) {
        self.disconnect().await;
    }

    // Producers

    /// Sends a conversation message to the account's other devices, queueing
    /// it if the channel is down.
    pub async fn broadcast_message(&mut self, message: ChatMessage) -> SyncResult<Delivery> {
        self.publish(SyncPayload::conversation(message)).await
    }

    /// Announces this device's status.
    pub async fn update_device_status(&mut self, status: DeviceStatus) -> SyncResult<Delivery> {
        let device_type = self.device.device_type;
        self.publish(SyncPayload::device_status(status, Some(device_type)))
            .await
    }

    pub async fn update_preferences(&mut self, preferences: Preferences) -> SyncResult<Delivery> {
        self.publish(SyncPayload::preferences(preferences)).await
    }

    /// Feeds the local input box into the typing debouncer. Typing
    /// indicators are never queued.
    pub async fn input_changed(&mut self, text: &str) -> SyncResult<()> {
        if !self.state.is_connected() {
            // Nobody hears it; the first keystroke once online announces again
            self.typing.reset();
            self.timers.cancel(TimerKind::TypingIdle);
            return Ok(());
        }
        let change = self.typing.on_input(text, Instant::now());
        match self.typing.deadline() {
            Some(deadline) => self.timers.arm(TimerKind::TypingIdle, deadline),
            None => self.timers.cancel(TimerKind::TypingIdle),
        }
        if let Some(is_typing) = change {
            self.send_typing(is_typing).await;
        }
        Ok(())
    }

    /// Sends a payload on the live channel.
    pub async fn send(&mut self, payload: SyncPayload) -> SyncResult<()> {
        if !self.state.is_connected() {
            return Err(SyncError::NotConnected);
        }
        let Some(credentials) = &self.credentials else {
            return Err(SyncError::NotConnected);
        };
        let message = self
            .dispatcher
            .wrap(payload, &credentials.user_id, self.clock.as_ref());
        debug!(message_type = %message.message_type(), "sending");
        self.send_frame(ClientFrame::sync(message)).await
    }

    /// Replays the offline queue.
    pub async fn drain_queue(&mut self) -> SyncResult<DrainReport> {
        let user_id = self
            .credentials
            .as_ref()
            .map(|c| c.user_id.clone())
            .unwrap_or_default();
        let mut deliverer = ChannelDeliverer {
            transport: &mut self.transport,
            user_id: &user_id,
            device_id: &self.device.device_id,
            online: self.state.is_connected(),
            lost: None,
        };
        let report = self.queue.drain(&mut deliverer).await?;
        let lost = deliverer.lost.take();

        if report.delivered > 0 || !report.dropped.is_empty() {
            info!(
                delivered = report.delivered,
                retried = report.retried,
                dropped = report.dropped.len(),
                "drained offline queue"
            );
        }
        for item in &report.dropped {
            self.events.emit(SyncEvent::DeliveryFailed(item.clone()));
        }
        if let Some(reason) = lost {
            self.on_connection_lost(&reason).await;
        }
        Ok(report)
    }

    // Event loop

    /// Waits for the next inbound frame or timer. Cancel-safe.
    pub async fn wait(&mut self) -> Wake {
        let receiving = self.state.is_connected() && self.transport.is_connected();
        let next = self.timers.next();
        let (kind, deadline) = next.unwrap_or((TimerKind::Heartbeat, Instant::now()));

        tokio::select! {
            frame = self.transport.recv(), if receiving => Wake::Frame(frame),
            _ = tokio::time::sleep_until(deadline), if next.is_some() => Wake::Timer(kind),
            else => Wake::Idle,
        }
    }

    /// Handles what [`wait`](SyncService::wait) returned.
    pub async fn handle(&mut self, wake: Wake) {
        match wake {
            Wake::Frame(Ok(Some(frame))) => self.handle_frame(frame).await,
            Wake::Frame(Ok(None)) => self.on_connection_lost("connection closed").await,
            Wake::Frame(Err(TransportError::SerializationError(e))) => {
                warn!(error = %e, "discarding malformed frame");
            }
            Wake::Frame(Err(e)) => self.on_connection_lost(&e.to_string()).await,
            Wake::Timer(kind) => {
                self.timers.cancel(kind);
                self.handle_timer(kind).await;
            }
            Wake::Idle => {}
        }
    }

    /// Runs one turn of the loop. Returns false if there was nothing to wait
    /// for.
    pub async fn step(&mut self) -> bool {
        let wake = self.wait().await;
        let idle = matches!(wake, Wake::Idle);
        self.handle(wake).await;
        !idle
    }

    // Internals

    fn handshake(&self, credentials: &Credentials) -> Handshake {
        Handshake::new(
            credentials.token.as_str(),
            credentials.user_id.as_str(),
            self.device.device_id.as_str(),
            self.device.device_type,
        )
    }

    async fn attempt_connect(&mut self) -> SyncResult<()> {
        let Some(credentials) = self.credentials.clone() else {
            return Err(SyncError::Authentication("no credentials".to_string()));
        };
        let handshake = self.handshake(&credentials);
        self.state.start_attempt();
        info!(url = %self.config.url, retry = self.state.retry_count(), "connecting");

        let timeout = self.config.connect_timeout();
        let attempt = self.transport.connect(&self.config.url, &handshake);
        let result = tokio::time::timeout(timeout, attempt).await;
        match result {
            Ok(Ok(devices)) => {
                self.on_connected(devices).await;
                Ok(())
            }
            Ok(Err(TransportError::Rejected(reason))) => {
                warn!(reason = %reason, "handshake rejected");
                self.credentials = None;
                self.state.on_rejected(&reason);
                self.events.emit(SyncEvent::AuthenticationFailed {
                    reason: reason.clone(),
                });
                Err(SyncError::Authentication(reason))
            }
            Ok(Err(e)) => {
                warn!(error = %e, "connect failed");
                self.schedule_reconnect(&e.to_string());
                Err(e.into())
            }
            Err(_) => {
                let _ = self.transport.disconnect().await;
                let ms = self.config.connect_timeout_ms;
                warn!(timeout_ms = ms, "connect timed out");
                self.schedule_reconnect("connect timed out");
                Err(SyncError::Timeout(ms))
            }
        }
    }

    async fn on_connected(&mut self, devices: Vec<Device>) {
        self.state.on_connected(self.clock.now_ms());
        self.presence.seed(&devices);
        self.pending_ping = None;
        self.timers.cancel(TimerKind::PongTimeout);
        self.arm_heartbeat();
        info!(device_id = %self.device.device_id, peers = devices.len(), "connected");
        self.events.emit(SyncEvent::Connected { devices });

        if self.config.sync_on_reconnect {
            if let Err(e) = self.drain_queue().await {
                warn!(error = %e, "drain after connect failed");
            }
        }
    }

    async fn on_connection_lost(&mut self, reason: &str) {
        if !self.state.is_connected() {
            return;
        }
        warn!(reason = %reason, "connection lost");
        self.timers.cancel(TimerKind::Heartbeat);
        self.timers.cancel(TimerKind::PongTimeout);
        self.timers.cancel(TimerKind::TypingIdle);
        self.typing.reset();
        self.pending_ping = None;
        let _ = self.transport.disconnect().await;
        self.state.on_lost();
        self.presence.clear();
        self.events.emit(SyncEvent::Disconnected {
            reason: reason.to_string(),
        });
        self.schedule_reconnect(reason);
    }

    fn schedule_reconnect(&mut self, error: &str) {
        match self.state.schedule_retry(&self.backoff, error) {
            RetryDecision::Retry { attempt, delay } => {
                info!(attempt, delay_ms = delay.as_millis() as u64, "reconnect scheduled");
                self.timers.arm_in(TimerKind::Reconnect, delay);
                self.events
                    .emit(SyncEvent::ReconnectScheduled { attempt, delay });
            }
            RetryDecision::GiveUp { attempts } => {
                warn!(attempts, error = %error, "giving up reconnecting");
                self.timers.cancel(TimerKind::Reconnect);
                self.events.emit(SyncEvent::ReconnectFailed {
                    error: SyncError::GivenUp { attempts }.to_string(),
                });
            }
        }
    }

    fn arm_heartbeat(&mut self) {
        let interval = self.config.heartbeat_interval(self.foreground);
        self.timers.arm_in(TimerKind::Heartbeat, interval);
    }

    async fn send_frame(&mut self, frame: ClientFrame) -> SyncResult<()> {
        match self.transport.send(frame).await {
            Ok(()) => Ok(()),
            Err(e) => {
                if !self.transport.is_connected() {
                    self.on_connection_lost(&e.to_string()).await;
                }
                Err(e.into())
            }
        }
    }

    async fn publish(&mut self, payload: SyncPayload) -> SyncResult<Delivery> {
        // Direct sends must not overtake queued items
        if self.state.is_connected() && self.queue.is_empty()? {
            match self.send(payload.clone()).await {
                Ok(()) => return Ok(Delivery::Sent),
                Err(SyncError::NotConnected) | Err(SyncError::Transport(_)) => {}
                Err(e) => return Err(e),
            }
        }
        self.enqueue(&payload).await?;
        Ok(Delivery::Queued)
    }

    async fn enqueue(&mut self, payload: &SyncPayload) -> SyncResult<()> {
        let item = OfflineQueueItem::from_payload(
            generate_item_id(),
            payload,
            self.clock.now_ms(),
            self.config.queue_max_retries,
        )?;
        let evicted = self.queue.enqueue(item)?;
        for item in evicted {
            self.events.emit(SyncEvent::DeliveryFailed(item));
        }
        if self.state.is_connected() {
            self.drain_queue().await?;
        }
        Ok(())
    }

    /// Sends a typing indicator, forgetting the debouncer state if it
    /// cannot go out.
    async fn send_typing(&mut self, is_typing: bool) {
        if let Err(e) = self.send(SyncPayload::typing(is_typing)).await {
            debug!(error = %e, "typing indicator not sent");
            self.typing.reset();
            self.timers.cancel(TimerKind::TypingIdle);
        }
    }

    async fn handle_frame(&mut self, frame: ServerFrame) {
        // Any inbound frame proves the channel is alive
        self.pending_ping = None;
        self.timers.cancel(TimerKind::PongTimeout);

        match frame {
            ServerFrame::Sync { message } => self.handle_message(message),
            ServerFrame::Pong { id } => debug!(id, "pong"),
            ServerFrame::Welcome { devices } => self.presence.seed(&devices),
            ServerFrame::Error { message } => warn!(error = %message, "relay reported error"),
            ServerFrame::Rejected { reason } => {
                warn!(reason = %reason, "relay revoked session");
                self.timers.cancel_all();
                self.typing.reset();
                self.credentials = None;
                let _ = self.transport.disconnect().await;
                self.state.on_rejected(&reason);
                self.presence.clear();
                self.events
                    .emit(SyncEvent::AuthenticationFailed { reason });
            }
        }
    }

    fn handle_message(&mut self, message: SyncMessage) {
        let expected_user = self.credentials.as_ref().map(|c| c.user_id.as_str());
        if expected_user.is_some_and(|user| user != message.user_id()) {
            warn!(
                user_id = %message.user_id(),
                "discarding envelope for another account"
            );
            return;
        }
        let Some(route) = self.dispatcher.route(message) else {
            return;
        };

        let now = self.clock.now_ms();
        self.state.mark_synced(now);
        match route {
            Route::Conversation(message) => {
                debug!(from = %message.device_id(), "message received");
                self.events.emit(SyncEvent::MessageReceived(message));
            }
            Route::DeviceStatus {
                device_id, status, ..
            } => {
                self.presence.apply_status(&device_id, status);
                self.events
                    .emit(SyncEvent::DeviceStatusUpdate { device_id, status });
            }
            Route::Typing {
                device_id,
                is_typing,
            } => {
                self.presence.apply_typing(&device_id, is_typing, now);
                self.events.emit(SyncEvent::TypingIndicator {
                    device_id,
                    is_typing,
                });
            }
            Route::Preferences {
                device_id,
                preferences,
            } => {
                self.events.emit(SyncEvent::PreferencesUpdated {
                    device_id,
                    preferences,
                });
            }
        }
    }

    async fn handle_timer(&mut self, kind: TimerKind) {
        match kind {
            TimerKind::Heartbeat => {
                if !self.state.is_connected() {
                    return;
                }
                let id = self.next_ping_id;
                self.next_ping_id += 1;
                if self.send_frame(ClientFrame::ping(id)).await.is_ok() {
                    debug!(id, "ping");
                    self.pending_ping = Some(id);
                    self.timers
                        .arm_in(TimerKind::PongTimeout, self.config.heartbeat_timeout());
                }
                if self.state.is_connected() {
                    self.arm_heartbeat();
                }
            }
            TimerKind::PongTimeout => {
                if self.pending_ping.is_some() {
                    self.on_connection_lost("heartbeat timeout").await;
                }
            }
            TimerKind::Reconnect => {
                if matches!(self.state.phase(), Phase::Reconnecting { .. }) {
                    // Failures reschedule themselves
                    let _ = self.attempt_connect().await;
                }
            }
            TimerKind::TypingIdle => {
                if let Some(is_typing) = self.typing.on_timeout(Instant::now()) {
                    self.send_typing(is_typing).await;
                }
            }
        }
    }
}

/// Delivers queued items over the service's transport.
struct ChannelDeliverer<'a, T> {
    transport: &'a mut T,
    user_id: &'a str,
    device_id: &'a str,
    online: bool,
    /// Set when a send failure took the channel down.
    lost: Option<String>,
}

impl<T: Transport> Deliver for ChannelDeliverer<'_, T> {
    fn deliver<'a>(
        &'a mut self,
        item: &'a OfflineQueueItem,
    ) -> Pin<Box<dyn Future<Output = Result<(), DeliveryError>> + Send + 'a>> {
        Box::pin(async move {
            if !self.online || !self.transport.is_connected() {
                return Err(DeliveryError::Offline);
            }
            let payload = item
                .payload()
                .map_err(|e| DeliveryError::Failed(e.to_string()))?;
            let message = SyncMessage::at(payload, self.user_id, self.device_id, item.enqueued_at);
            match self.transport.send(ClientFrame::sync(message)).await {
                Ok(()) => Ok(()),
                Err(e) if self.transport.is_connected() => Err(DeliveryError::Failed(e.to_string())),
                Err(e) => {
                    self.lost = Some(e.to_string());
                    Err(DeliveryError::Offline)
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
