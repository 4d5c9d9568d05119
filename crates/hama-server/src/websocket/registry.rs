//! Registry of live sessions.
//!
//! Registration enqueues the `hello` frame before the session becomes
//! visible, so `hello` is always the first frame a peer receives. All
//! operations take `&self` and are safe to call from any task.

use std::sync::Arc;

use dashmap::DashMap;
use hama_core::{Envelope, SessionId};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::errors::SendError;
use crate::websocket::connection::SessionHandle;

/// Static fields of the `hello` frame.
#[derive(Clone, Debug)]
pub struct HelloTemplate {
    /// Server display name.
    pub peer_name: String,
    /// Capability flags.
    pub capabilities: Value,
    /// Version/platform block.
    pub server_info: Option<Value>,
    /// Usage instructions.
    pub instructions: Option<String>,
}

impl HelloTemplate {
    /// `hello` for `session_id`.
    pub fn hello_for(&self, session_id: &SessionId) -> Envelope {
        Envelope::Hello {
            session_id: session_id.clone(),
            peer_name: self.peer_name.clone(),
            capabilities: self.capabilities.clone(),
            server_info: self.server_info.clone(),
            instructions: self.instructions.clone(),
        }
    }
}

impl From<&ServerConfig> for HelloTemplate {
    fn from(config: &ServerConfig) -> Self {
        Self {
            peer_name: config.peer_name.clone(),
            capabilities: config.capabilities.clone(),
            server_info: Some(config.server_info()),
            instructions: config.instructions.clone(),
        }
    }
}

/// Live sessions keyed by [`SessionId`].
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<SessionHandle>>,
    hello: HelloTemplate,
}

impl SessionRegistry {
    /// Empty registry announcing `hello` on every registration.
    pub fn new(hello: HelloTemplate) -> Self {
        Self {
            sessions: DashMap::new(),
            hello,
        }
    }

    /// Register a session whose writer drains `tx`.
    ///
    /// Assigns a fresh ID and enqueues `hello` first. If `hello` cannot be
    /// enqueued the session is not registered.
    pub fn register(&self, tx: mpsc::Sender<Arc<String>>) -> Result<SessionId, SendError> {
        let id = SessionId::new();
        let handle = Arc::new(SessionHandle::new(id.clone(), tx));
        let hello = self.hello.hello_for(&id).encode()?;
        handle.send(Arc::new(hello))?;
        let _ = self.sessions.insert(id.clone(), handle);
        info!(session_id = %id, sessions = self.sessions.len(), "session registered");
        Ok(id)
    }

    /// Remove a session. Returns `false` if it was not registered.
    pub fn unregister(&self, id: &SessionId) -> bool {
        let Some((_, handle)) = self.sessions.remove(id) else {
            return false;
        };
        info!(
            session_id = %id,
            sessions = self.sessions.len(),
            duration_secs = handle.age().as_secs(),
            dropped_frames = handle.drop_count(),
            "session unregistered"
        );
        true
    }

    /// Send one envelope to one session.
    pub fn send(&self, id: &SessionId, envelope: &Envelope) -> Result<(), SendError> {
        let frame = Arc::new(envelope.encode()?);
        self.send_frame(id, frame)
    }

    /// Send a pre-encoded frame to one session.
    pub fn send_frame(&self, id: &SessionId, frame: Arc<String>) -> Result<(), SendError> {
        let handle = self
            .get(id)
            .ok_or_else(|| SendError::SessionNotFound(id.clone()))?;
        handle.send(frame)
    }

    /// Send one envelope to every session; returns how many accepted it.
    ///
    /// Failures are logged and skipped. Eviction is the keepalive loop's job.
    pub fn broadcast(&self, envelope: &Envelope) -> Result<usize, SendError> {
        let frame = Arc::new(envelope.encode()?);
        let mut delivered = 0;
        for handle in self.handles() {
            match handle.send(Arc::clone(&frame)) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(session_id = %handle.id(), error = %e, "broadcast send failed");
                }
            }
        }
        debug!(
            kind = envelope.type_name(),
            delivered,
            sessions = self.sessions.len(),
            "broadcast"
        );
        Ok(delivered)
    }

    /// Look up a session.
    pub fn get(&self, id: &SessionId) -> Option<Arc<SessionHandle>> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    /// IDs of every live session, in registration order.
    pub fn session_ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.sessions.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Frames live sessions failed to enqueue.
    pub fn dropped_frames(&self) -> u64 {
        self.sessions.iter().map(|e| e.value().drop_count()).sum()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// True when nobody is connected.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Snapshot of handles, collected so no shard lock is held while sending.
    fn handles(&self) -> Vec<Arc<SessionHandle>> {
        self.sessions.iter().map(|e| Arc::clone(e.value())).collect()
    }
}
