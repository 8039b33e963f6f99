// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket server implementation.
//!
//! Handles the handshake, per-account fan-out, and keepalive for each
//! connection.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, warn};

use tandem_core::{ClientFrame, Handshake, ServerFrame};

use crate::error::{RelayError, Result};
use crate::state::{RelayState, Session};

/// How long a new connection may take to send its `hello`.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsStream = SplitStream<WebSocketStream<TcpStream>>;

/// Run the WebSocket server on the given address.
pub async fn run(addr: SocketAddr, state: RelayState) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on: {}", addr);
    serve(listener, state).await
}

/// Accept connections from an already bound listener.
pub async fn serve(listener: TcpListener, state: RelayState) -> Result<()> {
    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let state = state.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }
}

/// Handle a single WebSocket connection.
pub(crate) async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: RelayState,
) -> Result<()> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    debug!("New WebSocket connection from: {}", peer_addr);

    let (mut ws_sink, mut ws_stream) = ws_stream.split();

    let handshake = match tokio::time::timeout(HANDSHAKE_TIMEOUT, read_hello(&mut ws_stream)).await
    {
        Ok(Ok(Some(handshake))) => handshake,
        Ok(Ok(None)) => return Ok(()),
        Ok(Err(e @ RelayError::Rejected(_))) => {
            warn!(peer = %peer_addr, error = %e, "handshake rejected");
            reject(&mut ws_sink, &reason(&e)).await?;
            return Ok(());
        }
        Ok(Err(e)) => return Err(e),
        Err(_) => {
            reject(&mut ws_sink, "handshake timed out").await?;
            return Err(RelayError::HandshakeTimeout);
        }
    };

    let mut session = match state.join(&handshake).await {
        Ok(session) => session,
        Err(e) => {
            warn!(peer = %peer_addr, error = %e, "handshake rejected");
            reject(&mut ws_sink, &reason(&e)).await?;
            return Ok(());
        }
    };

    let result = serve_session(&mut ws_sink, &mut ws_stream, &mut session, &state).await;
    state.leave(&session.user_id, session.id).await;
    info!("Connection closed: {} ({})", peer_addr, session.device.device_id);
    result
}

async fn serve_session(
    ws_sink: &mut WsSink,
    ws_stream: &mut WsStream,
    session: &mut Session,
    state: &RelayState,
) -> Result<()> {
    send_frame(ws_sink, &ServerFrame::welcome(session.roster.clone())).await?;

    loop {
        tokio::select! {
            msg = ws_stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(response) = handle_client_frame(&text, session, state).await {
                            send_frame(ws_sink, &response).await?;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        debug!("Client {} disconnected", session.device.device_id);
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        ws_sink.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("WebSocket error from {}: {}", session.device.device_id, e);
                        break;
                    }
                    None => break,
                }
            }

            broadcast = session.rx.recv() => {
                match broadcast {
                    Ok(frame) => {
                        if let Err(e) = send_frame(ws_sink, &frame).await {
                            warn!("Failed to send broadcast to {}: {}", session.device.device_id, e);
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!("Client {} lagged by {} messages", session.device.device_id, n);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    Ok(())
}

/// Waits for the opening `hello`. `None` means the peer left first.
async fn read_hello(ws_stream: &mut WsStream) -> Result<Option<Handshake>> {
    loop {
        match ws_stream.next().await {
            Some(Ok(Message::Text(text))) => {
                return match ClientFrame::from_json(&text) {
                    Ok(ClientFrame::Hello(handshake)) => Ok(Some(handshake)),
                    Ok(_) => Err(RelayError::Rejected("expected hello".to_string())),
                    Err(e) => Err(RelayError::Rejected(format!("invalid frame: {}", e))),
                };
            }
            Some(Ok(Message::Close(_))) | None => return Ok(None),
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(e.into()),
        }
    }
}

/// Process a client frame and return an optional direct response.
async fn handle_client_frame(
    text: &str,
    session: &Session,
    state: &RelayState,
) -> Option<ServerFrame> {
    let frame = match ClientFrame::from_json(text) {
        Ok(frame) => frame,
        Err(e) => {
            debug!("Unparseable frame from {}: {}", session.device.device_id, e);
            return Some(ServerFrame::error(format!("invalid frame: {}", e)));
        }
    };

    match frame {
        ClientFrame::Sync { message } => {
            if message.user_id() != session.user_id {
                warn!(
                    device_id = %session.device.device_id,
                    "envelope for another account refused"
                );
                return Some(ServerFrame::error("user id mismatch"));
            }
            if message.device_id() != session.device.device_id {
                warn!(
                    device_id = %session.device.device_id,
                    claimed = %message.device_id(),
                    "envelope for another device refused"
                );
                return Some(ServerFrame::error("device id mismatch"));
            }
            // Response is via broadcast
            state.publish(message).await;
            None
        }
        ClientFrame::Ping { id } => {
            debug!("Ping received: {}", id);
            Some(ServerFrame::pong(id))
        }
        ClientFrame::Hello(_) => Some(ServerFrame::error("already connected")),
    }
}

async fn send_frame(ws_sink: &mut WsSink, frame: &ServerFrame) -> Result<()> {
    let json = frame.to_json()?;
    ws_sink.send(Message::Text(json.into())).await?;
    Ok(())
}

async fn reject(ws_sink: &mut WsSink, reason: &str) -> Result<()> {
    send_frame(ws_sink, &ServerFrame::rejected(reason)).await?;
    ws_sink.close().await?;
    Ok(())
}

fn reason(error: &RelayError) -> String {
    match error {
        RelayError::Rejected(reason) => reason.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
