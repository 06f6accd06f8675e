//! Listener: axum server loop and per-viewer WebSocket sessions.
//!
//! One TCP listener serves both the plain HTTP endpoints (see
//! [`http`](crate::infrastructure::http)) and the WebSocket channel.  A
//! session pumps two directions in one `select!` loop:
//!
//! - **Viewer → relay**: text frames go to
//!   [`RelayService::handle_viewer_message`].
//! - **Relay → viewer**: the connection's hub queues are drained onto the
//!   socket, events as text frames and `frame_update_full` as binary frames.
//!
//! Shutdown is cooperative: the server checks the shared `running` flag
//! every 200 ms and then stops accepting.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use axum::extract::ws::{Message as WsMessage, WebSocket};
use axum::extract::WebSocketUpgrade;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use relay_core::protocol::events::encode_server_event;
use relay_core::ConnectionHandle;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::application::{Outbound, RelayService};
use crate::infrastructure::http::{router, AppState};
use crate::infrastructure::hub::{ConnectionHub, OutboundReceiver};

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds `bind_addr` and serves until `running` is cleared.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn run_server(
    bind_addr: SocketAddr,
    service: Arc<RelayService>,
    hub: Arc<ConnectionHub>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind relay listener on {bind_addr}"))?;

    serve(listener, service, hub, running).await
}

/// Serves the relay on an already bound listener.
///
/// # Errors
///
/// Returns an error if the listener's local address cannot be read or the
/// server fails.
pub async fn serve(
    listener: TcpListener,
    service: Arc<RelayService>,
    hub: Arc<ConnectionHub>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let local_addr = listener
        .local_addr()
        .context("failed to read listener address")?;
    info!("relay listening on {local_addr}");

    axum::serve(listener, router(AppState { service, hub }))
        .with_graceful_shutdown(shutdown_requested(running))
        .await
        .context("relay server failed")?;

    info!("relay listener stopped");
    Ok(())
}

async fn shutdown_requested(running: Arc<AtomicBool>) {
    while running.load(Ordering::Relaxed) {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    info!("shutdown flag set; stopping listener");
}

/// Completes a WebSocket upgrade and runs the session on the socket.
pub(crate) fn upgrade(ws: WebSocketUpgrade, state: AppState) -> Response {
    ws.on_upgrade(move |socket| async move {
        if let Err(e) = run_session(socket, state.service, state.hub).await {
            warn!("websocket session ended with error: {e:#}");
        }
    })
}

// ── WebSocket session ─────────────────────────────────────────────────────────

/// Runs one WebSocket session and always releases its hub queues and, if it
/// was the viewer, the session slot.
async fn run_session(
    socket: WebSocket,
    service: Arc<RelayService>,
    hub: Arc<ConnectionHub>,
) -> anyhow::Result<()> {
    let handle = ConnectionHandle::new();
    let outbound = hub.register(handle);
    info!("websocket {handle} opened");

    let result = pump(socket, handle, outbound, &service).await;

    hub.unregister(handle);
    service.disconnect(handle).await;
    info!("websocket {handle} closed");
    result
}

async fn pump(
    socket: WebSocket,
    handle: ConnectionHandle,
    mut outbound: OutboundReceiver,
    service: &RelayService,
) -> anyhow::Result<()> {
    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            queued = outbound.recv() => {
                let Some(message) = queued else {
                    return Ok(());
                };
                if let Some(frame) = to_ws_message(message) {
                    ws_tx
                        .send(frame)
                        .await
                        .with_context(|| format!("send to {handle} failed"))?;
                }
            }
            incoming = ws_rx.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => {
                    service.handle_viewer_message(handle, &text).await;
                }
                Some(Ok(WsMessage::Close(_))) | None => return Ok(()),
                Some(Ok(other)) => debug!("ignoring non-text frame from {handle}: {other:?}"),
                Some(Err(e)) => return Err(e).with_context(|| format!("read from {handle} failed")),
            },
        }
    }
}

fn to_ws_message(message: Outbound) -> Option<WsMessage> {
    match message {
        Outbound::Event(event) => match encode_server_event(&event) {
            Ok(text) => Some(WsMessage::Text(text)),
            Err(e) => {
                warn!("failed to encode {event:?}: {e}");
                None
            }
        },
        Outbound::Frame(payload) => Some(WsMessage::Binary(payload)),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
