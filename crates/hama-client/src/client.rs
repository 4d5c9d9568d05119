//! [`ToolClient`]: one connection to a tool host.
//!
//! All mutable connection state (state machine, current transport, reader
//! task) lives under one mutex, and every state change happens while it is
//! held. Pending requests are registered and drained under that same lock,
//! so a request either sees `Connected` and is drained by the next terminal
//! transition, or sees a terminal state and fails with `NotConnected`.
//!
//! Each `connect` bumps an epoch. Events from a reader task whose epoch is
//! no longer current are ignored, which keeps a late close from an old
//! socket from tearing down a newer session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use hama_core::{Envelope, SessionId};
use hama_settings::ClientSettings;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::correlator::Correlator;
use crate::errors::{ConnectError, RequestError, TransportError};
use crate::events::{ClientEvent, Routed, route_event};
use crate::logs::{LogMessage, LogStream};
use crate::state::{ConnectionState, StateMachine, StateObserver, StateTrigger};
use crate::transport::{Connection, Connector, Transport, TransportEvent, WsConnector};

/// Client tuning.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Server URL used by [`ToolClient::connect_default`].
    pub url: String,
    /// Capacity of the event and log broadcast channels.
    pub event_buffer: usize,
    /// Upper bound on the socket handshake.
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from(&ClientSettings::default())
    }
}

impl From<&ClientSettings> for ClientConfig {
    fn from(settings: &ClientSettings) -> Self {
        Self {
            url: settings.url.clone(),
            event_buffer: settings.event_buffer.max(1),
            connect_timeout: Duration::from_secs(settings.connect_timeout_secs),
        }
    }
}

/// What the server announced in `hello`.
#[derive(Clone, Debug, PartialEq)]
pub struct ServerInfo {
    /// Session identity.
    pub session_id: SessionId,
    /// Server display name.
    pub peer_name: String,
    /// Version/platform block, if the server sent one.
    pub server_version: Option<Value>,
    /// Capability flags.
    pub capabilities: Value,
    /// Usage instructions, if any.
    pub instructions: Option<String>,
}

/// Handle to a tool host connection. Cheap to clone.
#[derive(Clone)]
pub struct ToolClient {
    inner: Arc<Inner>,
}

struct Inner {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    connecting: AtomicBool,
    link: Mutex<Link>,
    correlator: Correlator,
    server_info: watch::Sender<Option<ServerInfo>>,
    events: broadcast::Sender<ClientEvent>,
    logs: LogStream,
}

struct Link {
    machine: StateMachine,
    epoch: u64,
    transport: Option<Arc<dyn Transport>>,
    reader: Option<JoinHandle<()>>,
}

impl ToolClient {
    /// Client speaking WebSocket via `tokio-tungstenite`.
    pub fn new(config: ClientConfig) -> Self {
        let connector = Arc::new(WsConnector::new(config.event_buffer));
        Self::with_connector(config, connector)
    }

    /// Client over a custom transport.
    pub fn with_connector(config: ClientConfig, connector: Arc<dyn Connector>) -> Self {
        let (server_info, _) = watch::channel(None);
        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        let logs = LogStream::new(config.event_buffer);
        Self {
            inner: Arc::new(Inner {
                config,
                connector,
                connecting: AtomicBool::new(false),
                link: Mutex::new(Link {
                    machine: StateMachine::new(),
                    epoch: 0,
                    transport: None,
                    reader: None,
                }),
                correlator: Correlator::new(),
                server_info,
                events,
                logs,
            }),
        }
    }

    /// Open a session with the server at `url`.
    ///
    /// Returns once the socket is open; the state becomes `Connected` when
    /// the server's `hello` arrives. Rejected while another connect is in
    /// progress or a session is live.
    pub async fn connect(&self, url: &str) -> Result<(), ConnectError> {
        let inner = &self.inner;
        if inner.connecting.swap(true, Ordering::AcqRel) {
            debug!(url, "connect ignored, already connecting");
            return Err(ConnectError::AlreadyActive);
        }

        let epoch = {
            let mut link = inner.link.lock();
            if link.machine.apply(StateTrigger::ConnectRequested).is_none() {
                inner.connecting.store(false, Ordering::Release);
                return Err(ConnectError::AlreadyActive);
            }
            link.epoch += 1;
            link.epoch
        };
        info!(url, "connecting");
        inner.logs.info(format!("connecting to {url}"));

        let result = tokio::time::timeout(inner.config.connect_timeout, inner.connector.connect(url))
            .await
            .unwrap_or(Err(TransportError::Timeout));

        let stale = {
            let mut link = inner.link.lock();
            if link.epoch == epoch {
                return match result {
                    Ok(Connection { transport, events }) => {
                        link.transport = Some(transport);
                        link.reader = Some(tokio::spawn(read_loop(
                            Arc::downgrade(inner),
                            epoch,
                            events,
                        )));
                        Ok(())
                    }
                    Err(e) => {
                        warn!(url, error = %e, "connect failed");
                        inner.logs.error(format!("connection failed: {e}"));
                        let _ = inner.transition(&mut link, StateTrigger::TransportError(e.to_string()));
                        Err(e.into())
                    }
                };
            }
            result.ok()
        };

        // disconnect() ran while the handshake was in flight.
        if let Some(conn) = stale {
            conn.transport.close().await;
        }
        Err(ConnectError::Cancelled)
    }

    /// [`connect`](Self::connect) to the configured URL.
    pub async fn connect_default(&self) -> Result<(), ConnectError> {
        let url = self.inner.config.url.clone();
        self.connect(&url).await
    }

    /// Close the session, then enter `Disconnected`.
    ///
    /// Pending requests fail with `ConnectionLost`. Safe to call in any state.
    pub async fn disconnect(&self) {
        let inner = &self.inner;
        let (transport, reader) = {
            let mut link = inner.link.lock();
            link.epoch += 1;
            (link.transport.take(), link.reader.take())
        };
        if let Some(reader) = reader {
            reader.abort();
        }
        if let Some(transport) = transport {
            transport.close().await;
            inner.logs.info("disconnected");
        }
        {
            let mut link = inner.link.lock();
            let _ = inner.transition(&mut link, StateTrigger::TransportClosed);
        }
        inner.connecting.store(false, Ordering::Release);
    }

    /// Send a request and wait for its reply.
    ///
    /// Fails immediately with `NotConnected` unless the state is `Connected`.
    /// Dropping the returned future abandons the request.
    pub async fn send(&self, method: &str, params: Value) -> Result<Value, RequestError> {
        let (call, transport) = {
            let link = self.inner.link.lock();
            if !link.machine.current().is_connected() {
                return Err(RequestError::NotConnected);
            }
            let Some(transport) = link.transport.clone() else {
                return Err(RequestError::NotConnected);
            };
            (self.inner.correlator.register(), transport)
        };

        let frame = Envelope::request(call.id().clone(), method, params).encode()?;
        debug!(request_id = %call.id(), method, "sending request");
        transport.send_text(frame).await?;
        self.inner.logs.info(format!("request sent: {method}"));
        call.wait().await
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.inner.link.lock().machine.current().clone()
    }

    /// Stream of every state entered from now on, starting with the current one.
    pub fn observe_state(&self) -> StateObserver {
        self.inner.link.lock().machine.subscribe()
    }

    /// What the server announced, while connected.
    pub fn server_info(&self) -> Option<ServerInfo> {
        self.inner.server_info.borrow().clone()
    }

    /// Watch server info changes.
    pub fn watch_server_info(&self) -> watch::Receiver<Option<ServerInfo>> {
        self.inner.server_info.subscribe()
    }

    /// Subscribe to server pushes.
    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.inner.events.subscribe()
    }

    /// Retained log lines, oldest first.
    pub fn logs(&self) -> Vec<LogMessage> {
        self.inner.logs.snapshot()
    }

    /// Subscribe to new log lines.
    pub fn subscribe_logs(&self) -> broadcast::Receiver<LogMessage> {
        self.inner.logs.subscribe()
    }

    /// Requests awaiting a reply.
    pub fn pending_requests(&self) -> usize {
        self.inner.correlator.len()
    }
}

impl std::fmt::Debug for ToolClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolClient")
            .field("state", &self.state())
            .field("pending", &self.pending_requests())
            .finish_non_exhaustive()
    }
}

impl Inner {
    /// Apply `trigger`. Terminal states release the transport and the
    /// connecting flag, clear server info, and fail all pending requests.
    fn transition(&self, link: &mut Link, trigger: StateTrigger) -> bool {
        let Some(next) = link.machine.apply(trigger) else {
            return false;
        };
        if next.is_terminal() {
            link.transport = None;
            let _ = link.reader.take();
            self.connecting.store(false, Ordering::Release);
            let _ = self.server_info.send_replace(None);
            let drained = self.correlator.fail_all();
            if drained > 0 {
                debug!(drained, "failed pending requests on connection loss");
            }
        }
        true
    }

    /// Returns `false` once the socket is finished.
    fn handle_transport_event(&self, epoch: u64, event: TransportEvent) -> bool {
        match event {
            TransportEvent::Opened => {
                debug!("transport opened, awaiting hello");
                self.logs.info("socket open, awaiting hello");
                true
            }
            TransportEvent::Frame(text) => {
                self.handle_frame(epoch, &text);
                true
            }
            TransportEvent::Closed { reason } => {
                self.on_closed(epoch, reason);
                false
            }
            TransportEvent::Error(err) => {
                let mut link = self.link.lock();
                if link.epoch == epoch {
                    warn!(error = %err, "transport error");
                    self.logs.error(format!("connection error: {err}"));
                    let _ = self.transition(&mut link, StateTrigger::TransportError(err.to_string()));
                }
                false
            }
        }
    }

    fn on_closed(&self, epoch: u64, reason: Option<String>) {
        let mut link = self.link.lock();
        if link.epoch != epoch {
            return;
        }
        if self.transition(&mut link, StateTrigger::TransportClosed) {
            info!(reason = reason.as_deref().unwrap_or(""), "connection closed");
            self.logs.info(match reason {
                Some(reason) => format!("disconnected: {reason}"),
                None => "disconnected".to_string(),
            });
        }
    }

    fn handle_frame(&self, epoch: u64, text: &str) {
        let envelope = match Envelope::decode(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "dropping malformed frame");
                self.logs.error(format!("malformed frame: {e}"));
                return;
            }
        };

        match envelope {
            Envelope::Hello {
                session_id,
                peer_name,
                capabilities,
                server_info,
                instructions,
            } => self.on_hello(
                epoch,
                ServerInfo {
                    session_id,
                    peer_name,
                    server_version: server_info,
                    capabilities,
                    instructions,
                },
            ),
            Envelope::Response { request_id, data } => {
                if !self.correlator.resolve(&request_id, Ok(data)) {
                    debug!(%request_id, "discarding unmatched response");
                }
            }
            Envelope::Error {
                request_id: Some(request_id),
                message,
            } => {
                self.logs.error(message.clone());
                if !self
                    .correlator
                    .resolve(&request_id, Err(RequestError::Remote { message }))
                {
                    debug!(%request_id, "discarding unmatched error");
                }
            }
            Envelope::Error {
                request_id: None,
                message,
            } => {
                warn!(%message, "server reported an error");
                self.logs.error(message);
            }
            Envelope::Event { kind, data } => match route_event(kind, data) {
                Routed::Event(event) => {
                    let _ = self.events.send(event);
                }
                Routed::Log(entry) => self.logs.push(entry),
            },
            Envelope::Ping { timestamp } => trace!(timestamp, "ping"),
            Envelope::Request { method, .. } => {
                warn!(method, "ignoring request sent by server");
            }
            Envelope::Unknown => debug!("ignoring envelope of unknown type"),
        }
    }

    fn on_hello(&self, epoch: u64, info: ServerInfo) {
        let mut link = self.link.lock();
        if link.epoch != epoch || *link.machine.current() != ConnectionState::Connecting {
            debug!(session_id = %info.session_id, "ignoring hello outside handshake");
            return;
        }
        let trigger = StateTrigger::HelloReceived {
            session_id: info.session_id.clone(),
            peer_name: info.peer_name.clone(),
        };
        info!(session_id = %info.session_id, peer = %info.peer_name, "connected");
        self.logs.info(format!("connected to {}", info.peer_name));
        // Published before the state so Connected observers can read it.
        let _ = self.server_info.send_replace(Some(info));
        let _ = self.transition(&mut link, trigger);
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(reader) = self.link.get_mut().reader.take() {
            reader.abort();
        }
    }
}

async fn read_loop(inner: Weak<Inner>, epoch: u64, mut events: mpsc::Receiver<TransportEvent>) {
    while let Some(event) = events.recv().await {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        if !inner.handle_transport_event(epoch, event) {
            return;
        }
    }
    if let Some(inner) = inner.upgrade() {
        inner.on_closed(epoch, None);
    }
}
