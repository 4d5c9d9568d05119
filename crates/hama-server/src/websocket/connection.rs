//! One live peer connection as seen by the registry.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use hama_core::SessionId;
use tokio::sync::mpsc;

use crate::errors::SendError;

/// Outbound side of a registered session.
///
/// Frames go through a bounded queue drained by the socket's writer task,
/// so sending never blocks the caller.
#[derive(Debug)]
pub struct SessionHandle {
    id: SessionId,
    tx: mpsc::Sender<Arc<String>>,
    connected_at: Instant,
    dropped_frames: AtomicU64,
}

impl SessionHandle {
    /// Wrap the writer queue `tx` under identity `id`.
    pub fn new(id: SessionId, tx: mpsc::Sender<Arc<String>>) -> Self {
        Self {
            id,
            tx,
            connected_at: Instant::now(),
            dropped_frames: AtomicU64::new(0),
        }
    }

    /// Session identity.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Enqueue one text frame.
    pub fn send(&self, frame: Arc<String>) -> Result<(), SendError> {
        self.tx.try_send(frame).map_err(|e| {
            let _ = self.dropped_frames.fetch_add(1, Ordering::Relaxed);
            match e {
                mpsc::error::TrySendError::Full(_) => SendError::Full,
                mpsc::error::TrySendError::Closed(_) => SendError::Closed,
            }
        })
    }

    /// Frames that could not be enqueued.
    pub fn drop_count(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    /// Time since registration.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
