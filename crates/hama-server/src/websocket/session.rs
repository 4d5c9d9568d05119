//! WebSocket session lifecycle: one connected peer from upgrade through
//! disconnect.
//!
//! Each session runs three tasks: the socket reader, a writer draining the
//! session's outbound queue, and a dispatcher that routes inbound frames
//! one at a time in arrival order. The reader keeps polling the socket while
//! a call runs, so a peer close is seen promptly. The exception is a full
//! inbound queue: reading then pauses until the dispatcher catches up.
//!
//! When the session ends, frames still queued are discarded, but a call
//! already handed to the executor runs to completion and its reply is
//! dropped as undeliverable.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use hama_core::SessionId;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, instrument, warn};

use crate::executor::ToolExecutor;
use crate::websocket::registry::SessionRegistry;
use crate::websocket::router::{RouteOutcome, route_frame};

/// Inbound frames buffered ahead of the dispatcher.
const INBOUND_QUEUE: usize = 64;

/// How long the writer gets to flush after the session ends.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Everything a session loop needs, shared across sessions.
pub struct SessionContext {
    /// Live sessions.
    pub registry: Arc<SessionRegistry>,
    /// Runs inbound requests.
    pub executor: Arc<dyn ToolExecutor>,
    /// Per-session outbound queue depth.
    pub max_send_queue: usize,
    /// Fires on server shutdown.
    pub shutdown: CancellationToken,
}

/// Run a WebSocket session for a connected peer.
///
/// 1. Registers the session (which enqueues `hello`)
/// 2. Spawns a writer draining the session's queue into the socket
/// 3. Spawns a dispatcher routing inbound text frames in arrival order
/// 4. Ends on peer close, socket error, eviction, or shutdown
/// 5. Unregisters and lets the writer flush a close frame
#[instrument(skip_all, fields(session_id))]
pub async fn run_ws_session(ws: WebSocket, ctx: Arc<SessionContext>) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (tx, mut rx) = mpsc::channel::<Arc<String>>(ctx.max_send_queue);

    let session_id = match ctx.registry.register(tx) {
        Ok(id) => id,
        Err(e) => {
            warn!(error = %e, "failed to register session");
            let _ = ws_tx.send(Message::Close(None)).await;
            return;
        }
    };
    let _ = tracing::Span::current().record("session_id", session_id.as_str());

    // Writer: ends when the registry drops the session's sender.
    let mut writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_tx.send(Message::Text(frame.as_str().to_owned().into())).await.is_err() {
                return;
            }
        }
        let _ = ws_tx.send(Message::Close(None)).await;
        let _ = ws_tx.close().await;
    });

    let (frames_tx, frames_rx) = mpsc::channel::<String>(INBOUND_QUEUE);
    let session_closed = CancellationToken::new();
    drop(tokio::spawn(
        dispatch_frames(
            frames_rx,
            session_id.clone(),
            Arc::clone(&ctx),
            session_closed.clone(),
        )
        .in_current_span(),
    ));

    let reader = async {
        loop {
            tokio::select! {
                msg = ws_rx.next() => {
                    let text = match msg {
                        Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
                        Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                            Ok(text) => text,
                            Err(_) => {
                                debug!(len = bytes.len(), "dropping non-utf8 binary frame");
                                continue;
                            }
                        },
                        Some(Ok(Message::Close(_))) | None => {
                            debug!("peer closed");
                            return;
                        }
                        Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                        Some(Err(e)) => {
                            debug!(error = %e, "socket read failed");
                            return;
                        }
                    };
                    tokio::select! {
                        sent = frames_tx.send(text) => {
                            if sent.is_err() {
                                return;
                            }
                        }
                        () = ctx.shutdown.cancelled() => {
                            debug!("server shutting down");
                            return;
                        }
                    }
                }
                () = ctx.shutdown.cancelled() => {
                    debug!("server shutting down");
                    return;
                }
            }
        }
    };

    let writer_done = tokio::select! {
        () = reader => false,
        _ = &mut writer => {
            debug!("writer finished first");
            true
        }
    };

    session_closed.cancel();
    let _ = ctx.registry.unregister(&session_id);
    if !writer_done
        && tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer)
            .await
            .is_err()
    {
        writer.abort();
    }
    info!("session closed");
}

/// Route frames one at a time until the session closes.
///
/// `closed` is only checked between frames, never during a call.
async fn dispatch_frames(
    mut frames: mpsc::Receiver<String>,
    session_id: SessionId,
    ctx: Arc<SessionContext>,
    closed: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            biased;
            () = closed.cancelled() => break,
            frame = frames.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };
        let outcome = route_frame(&frame, &session_id, &ctx.registry, ctx.executor.as_ref()).await;
        if outcome == RouteOutcome::Undeliverable && closed.is_cancelled() {
            debug!("call finished after session closed, reply dropped");
        }
    }
    if !frames.is_empty() {
        debug!(discarded = frames.len(), "discarding frames queued at close");
    }
}
