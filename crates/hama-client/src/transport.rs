//! Socket seam.
//!
//! [`Connector`] opens a [`Connection`]: a [`Transport`] for outbound text
//! frames plus a channel of [`TransportEvent`]s. [`WsConnector`] is the
//! `tokio-tungstenite` implementation; tests substitute in-memory ones.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::errors::TransportError;

/// How long `close` waits for the close frame to be flushed.
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Something that happened on the socket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// Handshake completed.
    Opened,
    /// One inbound text frame.
    Frame(String),
    /// The socket closed.
    Closed {
        /// Close reason, when the peer sent one.
        reason: Option<String>,
    },
    /// The socket failed; no further frames follow.
    Error(TransportError),
}

/// Outbound half of an open socket.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Queue one text frame.
    async fn send_text(&self, frame: String) -> Result<(), TransportError>;

    /// Close the socket. Returns once the close has been flushed or abandoned.
    async fn close(&self);
}

/// An open socket.
pub struct Connection {
    /// Outbound half.
    pub transport: Arc<dyn Transport>,
    /// Inbound events, ending when the socket is gone.
    pub events: mpsc::Receiver<TransportEvent>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

/// Opens sockets.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Perform the handshake with `url`.
    async fn connect(&self, url: &str) -> Result<Connection, TransportError>;
}

/// WebSocket connector over `tokio-tungstenite`.
#[derive(Clone, Debug)]
pub struct WsConnector {
    buffer: usize,
}

impl WsConnector {
    /// Connector whose per-socket queues hold `buffer` frames.
    pub fn new(buffer: usize) -> Self {
        Self {
            buffer: buffer.max(1),
        }
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new(256)
    }
}

enum Outbound {
    Text(String),
    Close(oneshot::Sender<()>),
}

struct WsTransport {
    tx: mpsc::Sender<Outbound>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send_text(&self, frame: String) -> Result<(), TransportError> {
        self.tx
            .send(Outbound::Text(frame))
            .await
            .map_err(|_| TransportError::Closed)
    }

    async fn close(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(Outbound::Close(ack_tx)).await.is_err() {
            return;
        }
        if tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, ack_rx).await.is_err() {
            debug!("close frame not flushed in time");
        }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Connection, TransportError> {
        let (ws, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let (mut sink, mut stream) = ws.split();

        let (out_tx, mut out_rx) = mpsc::channel::<Outbound>(self.buffer);
        let (event_tx, event_rx) = mpsc::channel(self.buffer);
        let _ = event_tx.send(TransportEvent::Opened).await;

        // Writer: drains the outbound queue onto the socket.
        drop(tokio::spawn(async move {
            while let Some(out) = out_rx.recv().await {
                match out {
                    Outbound::Text(text) => {
                        if let Err(e) = sink.send(Message::Text(text.into())).await {
                            warn!(error = %e, "websocket write failed");
                            break;
                        }
                    }
                    Outbound::Close(ack) => {
                        let _ = sink.send(Message::Close(None)).await;
                        let _ = sink.close().await;
                        let _ = ack.send(());
                        break;
                    }
                }
            }
        }));

        // Reader: turns socket messages into events.
        drop(tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                let event = match msg {
                    Ok(Message::Text(text)) => TransportEvent::Frame(text.as_str().to_owned()),
                    Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => TransportEvent::Frame(text),
                        Err(_) => {
                            debug!("dropping non-utf8 binary frame");
                            continue;
                        }
                    },
                    Ok(Message::Close(frame)) => {
                        let reason = frame
                            .map(|f| f.reason.as_str().to_owned())
                            .filter(|r| !r.is_empty());
                        let _ = event_tx.send(TransportEvent::Closed { reason }).await;
                        return;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        let err = TransportError::Socket(e.to_string());
                        let _ = event_tx.send(TransportEvent::Error(err)).await;
                        return;
                    }
                };
                if event_tx.send(event).await.is_err() {
                    return;
                }
            }
            let _ = event_tx.send(TransportEvent::Closed { reason: None }).await;
        }));

        Ok(Connection {
            transport: Arc::new(WsTransport { tx: out_tx }),
            events: event_rx,
        })
    }
}
