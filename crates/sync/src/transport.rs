// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Transport abstraction for the relay channel.
//!
//! Provides a trait-based transport layer that enables:
//! - Real WebSocket connections for production
//! - Mock transports for unit testing
//!
//! A transport owns the handshake: `connect` opens the socket, sends the
//! `hello` frame and waits for the relay's verdict, so callers only ever see
//! a channel that is fully accepted.

use std::future::Future;
use std::pin::Pin;

use tandem_core::{ClientFrame, Device, Handshake, ServerFrame};
use tracing::debug;

/// Error type for transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection closed unexpectedly.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// The relay refused the handshake.
    #[error("handshake rejected: {0}")]
    Rejected(String),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Transport trait for WebSocket-like communication.
///
/// This trait abstracts over the actual transport mechanism, allowing
/// for easy testing with mock implementations.
pub trait Transport: Send + Sync {
    /// Opens a channel and completes the handshake.
    ///
    /// Returns the account's other connected devices as reported by the relay.
    fn connect(
        &mut self,
        url: &str,
        handshake: &Handshake,
    ) -> Pin<Box<dyn Future<Output = TransportResult<Vec<Device>>> + Send + '_>>;

    /// Disconnect from the relay.
    fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>>;

    /// Send a frame to the relay.
    fn send(
        &mut self,
        frame: ClientFrame,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>>;

    /// Receive a frame from the relay.
    ///
    /// Returns `None` if the connection is closed. Must be cancel-safe: the
    /// service drops a pending `recv` whenever a timer fires first.
    fn recv(
        &mut self,
    ) -> Pin<Box<dyn Future<Output = TransportResult<Option<ServerFrame>>> + Send + '_>>;

    /// Check if connected.
    fn is_connected(&self) -> bool;
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// WebSocket transport implementation using tokio-tungstenite.
pub struct WebSocketTransport {
    /// The WebSocket connection, if connected.
    ws: Option<WebSocketConnection>,
}

/// Internal WebSocket connection wrapper.
struct WebSocketConnection {
    sink: futures_util::stream::SplitSink<WsStream, tokio_tungstenite::tungstenite::Message>,
    stream: futures_util::stream::SplitStream<WsStream>,
}

impl WebSocketTransport {
    /// Create a new WebSocket transport.
    pub fn new() -> Self {
        WebSocketTransport { ws: None }
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl WebSocketConnection {
    async fn send_frame(&mut self, frame: &ClientFrame) -> TransportResult<()> {
        use futures_util::SinkExt;
        use tokio_tungstenite::tungstenite::Message;

        let json = frame
            .to_json()
            .map_err(|e| TransportError::SerializationError(e.to_string()))?;
        self.sink
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        // Flush so a dead peer shows up as a send error here
        self.sink
            .flush()
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    /// Reads the next text frame. `Ok(None)` means the peer closed.
    async fn next_frame(&mut self) -> TransportResult<Option<ServerFrame>> {
        use futures_util::StreamExt;
        use tokio_tungstenite::tungstenite::Message;

        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    let frame = ServerFrame::from_json(&text)
                        .map_err(|e| TransportError::SerializationError(e.to_string()))?;
                    return Ok(Some(frame));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                // Ignore ping/pong and binary frames
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(TransportError::ReceiveFailed(e.to_string())),
            }
        }
    }
}

impl Transport for WebSocketTransport {
    fn connect(
        &mut self,
        url: &str,
        handshake: &Handshake,
    ) -> Pin<Box<dyn Future<Output = TransportResult<Vec<Device>>> + Send + '_>> {
        let url = url.to_string();
        let hello = ClientFrame::hello(handshake.clone());
        Box::pin(async move {
            use futures_util::{SinkExt, StreamExt};

            self.ws = None;
            let (ws_stream, _) = tokio_tungstenite::connect_async(&url)
                .await
                .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

            let (sink, stream) = ws_stream.split();
            let mut conn = WebSocketConnection { sink, stream };
            conn.send_frame(&hello).await?;

            loop {
                match conn.next_frame().await? {
                    Some(ServerFrame::Welcome { devices }) => {
                        debug!(url = %url, peers = devices.len(), "handshake accepted");
                        self.ws = Some(conn);
                        return Ok(devices);
                    }
                    Some(ServerFrame::Rejected { reason }) => {
                        let _ = conn.sink.close().await;
                        return Err(TransportError::Rejected(reason));
                    }
                    Some(ServerFrame::Error { message }) => {
                        let _ = conn.sink.close().await;
                        return Err(TransportError::ConnectionFailed(message));
                    }
                    // Nothing else is meaningful before the verdict
                    Some(_) => continue,
                    None => return Err(TransportError::ConnectionClosed),
                }
            }
        })
    }

    fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            if let Some(mut ws) = self.ws.take() {
                use futures_util::SinkExt;
                let _ = ws.sink.close().await;
            }
            Ok(())
        })
    }

    fn send(
        &mut self,
        frame: ClientFrame,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            let ws = self.ws.as_mut().ok_or(TransportError::ConnectionClosed)?;
            let result = ws.send_frame(&frame).await;
            if matches!(result, Err(TransportError::SendFailed(_))) {
                // Connection is broken, clear it
                self.ws = None;
            }
            result
        })
    }

    fn recv(
        &mut self,
    ) -> Pin<Box<dyn Future<Output = TransportResult<Option<ServerFrame>>> + Send + '_>> {
        Box::pin(async move {
            let ws = self.ws.as_mut().ok_or(TransportError::ConnectionClosed)?;
            let result = ws.next_frame().await;
            match &result {
                // A bad frame leaves the channel usable
                Err(TransportError::SerializationError(_)) | Ok(Some(_)) => {}
                Ok(None) | Err(_) => self.ws = None,
            }
            result
        })
    }

    fn is_connected(&self) -> bool {
        self.ws.is_some()
    }
}
