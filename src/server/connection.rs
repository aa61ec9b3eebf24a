//! Websocket subscriber handling
//!
//! Upgrades a request into a registry member, then blocks on the read half
//! until the peer goes away. Nothing the client sends is application data: a
//! close frame, a read error, end of stream or any data message all count as
//! a disconnect. Ping and pong are left to the protocol layer.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore, TryAcquireError};

use crate::registry::{FrameRegistry, FrameSink, WriteError};

/// State shared by every request handler
#[derive(Clone)]
pub(crate) struct ServerState {
    pub registry: Arc<FrameRegistry>,
    pub shutdown: watch::Receiver<bool>,
    pub ws_path: Arc<str>,
    /// One permit per subscriber; `None` means unlimited
    pub connection_limit: Option<Arc<Semaphore>>,
}

/// Write half of a websocket subscriber
pub struct WsSink {
    inner: SplitSink<WebSocket, Message>,
}

impl WsSink {
    pub fn new(inner: SplitSink<WebSocket, Message>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send_frame(&mut self, frame: Bytes) -> Result<(), WriteError> {
        // axum's Message owns a Vec, so each subscriber pays one copy here
        self.inner
            .send(Message::Binary(frame.to_vec()))
            .await
            .map_err(|e| WriteError::Transport(e.to_string()))
    }

    async fn close(&mut self) {
        // Sends the close frame
        let _ = self.inner.close().await;
    }
}

/// Why a subscriber's read loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
enum Disconnect {
    Closed,
    EndOfStream,
    UnexpectedMessage,
    ReadError(String),
    Shutdown,
}

impl fmt::Display for Disconnect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disconnect::Closed => write!(f, "closed by peer"),
            Disconnect::EndOfStream => write!(f, "end of stream"),
            Disconnect::UnexpectedMessage => write!(f, "unexpected inbound message"),
            Disconnect::ReadError(e) => write!(f, "read error: {}", e),
            Disconnect::Shutdown => write!(f, "server shutting down"),
        }
    }
}

/// Upgrade handler for the frame stream route
pub(crate) async fn ws_camera(
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<ServerState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    tracing::debug!(peer = %peer, "Websocket connection attempt");

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            tracing::warn!(peer = %peer, error = %rejection, "Error upgrading websocket connection");
            return rejection.into_response();
        }
    };

    // Held until the subscriber is gone; a failed upgrade drops it
    let permit = match acquire_slot(state.connection_limit.as_ref()) {
        Ok(permit) => permit,
        Err(_) => {
            tracing::warn!(peer = %peer, "Connection rejected: limit reached");
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
    };

    ws.on_failed_upgrade(move |e| {
        tracing::warn!(peer = %peer, error = %e, "Websocket upgrade failed");
    })
    .on_upgrade(move |socket| on_upgrade(socket, peer, state, permit))
}

fn acquire_slot(
    limit: Option<&Arc<Semaphore>>,
) -> Result<Option<OwnedSemaphorePermit>, TryAcquireError> {
    match limit {
        Some(sem) => sem.clone().try_acquire_owned().map(Some),
        None => Ok(None),
    }
}

/// Register the connection and hold it until the peer disconnects
async fn on_upgrade(
    socket: WebSocket,
    peer: SocketAddr,
    state: ServerState,
    _permit: Option<OwnedSemaphorePermit>,
) {
    let mut shutdown = state.shutdown.clone();
    if *shutdown.borrow() {
        tracing::debug!(peer = %peer, "Upgrade finished after shutdown, dropping");
        return;
    }

    let (sender, mut receiver) = socket.split();
    let id = state.registry.add(Box::new(WsSink::new(sender))).await;

    // stop() may have drained the registry between the check and the add
    if *shutdown.borrow() {
        state.registry.remove(id).await;
        return;
    }

    tracing::info!(connection_id = %id, peer = %peer, "Websocket connection established");

    let reason = tokio::select! {
        reason = read_until_disconnect(&mut receiver) => reason,
        _ = wait_shutdown(&mut shutdown) => Disconnect::Shutdown,
    };

    tracing::info!(connection_id = %id, peer = %peer, reason = %reason, "Websocket disconnected");

    // No-op if a failed write or stop() already removed it
    state.registry.remove(id).await;
}

async fn read_until_disconnect(receiver: &mut SplitStream<WebSocket>) -> Disconnect {
    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Ok(Message::Close(_)) => return Disconnect::Closed,
            Ok(_) => return Disconnect::UnexpectedMessage,
            Err(e) => return Disconnect::ReadError(e.to_string()),
        }
    }
    Disconnect::EndOfStream
}

pub(crate) async fn wait_shutdown(shutdown: &mut watch::Receiver<bool>) {
    // A dropped sender also means shutdown
    let _ = shutdown.wait_for(|stopping| *stopping).await;
}
