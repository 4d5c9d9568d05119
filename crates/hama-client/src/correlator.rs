//! Pending request table.
//!
//! Each outgoing request gets a fresh [`RequestId`] and a oneshot resolver.
//! A resolver is removed from the table under the lock before it fires, so
//! every request completes exactly once: by its reply, by a bulk
//! [`Correlator::fail_all`], or by the caller dropping its [`PendingCall`].

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Weak};

use hama_core::RequestId;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::warn;

use crate::errors::RequestError;

type Outcome = Result<Value, RequestError>;
type PendingMap = Mutex<HashMap<RequestId, oneshot::Sender<Outcome>>>;

/// Maps in-flight request IDs to their waiting callers.
#[derive(Debug, Default)]
pub struct Correlator {
    pending: Arc<PendingMap>,
}

impl Correlator {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh ID and register a waiter for it.
    pub fn register(&self) -> PendingCall {
        self.register_with(RequestId::new)
    }

    fn register_with(&self, mut next_id: impl FnMut() -> RequestId) -> PendingCall {
        let (tx, rx) = oneshot::channel();
        let mut pending = self.pending.lock();
        let mut tx = Some(tx);
        loop {
            let id = next_id();
            match pending.entry(id) {
                Entry::Occupied(occupied) => {
                    warn!(request_id = %occupied.key(), "request id collision, regenerating");
                }
                Entry::Vacant(vacant) => {
                    let id = vacant.key().clone();
                    if let Some(tx) = tx.take() {
                        let _ = vacant.insert(tx);
                    }
                    return PendingCall {
                        id,
                        rx,
                        pending: Arc::downgrade(&self.pending),
                    };
                }
            }
        }
    }

    /// Complete the request `id`. Returns `false` when nothing was waiting.
    pub fn resolve(&self, id: &RequestId, outcome: Outcome) -> bool {
        let Some(tx) = self.pending.lock().remove(id) else {
            return false;
        };
        // The caller may have stopped waiting; the entry is gone either way.
        let _ = tx.send(outcome);
        true
    }

    /// Fail every pending request with [`RequestError::ConnectionLost`].
    ///
    /// Returns how many were drained.
    pub fn fail_all(&self) -> usize {
        let drained: Vec<_> = self.pending.lock().drain().collect();
        let count = drained.len();
        for (_, tx) in drained {
            let _ = tx.send(Err(RequestError::ConnectionLost));
        }
        count
    }

    /// Number of requests awaiting a reply.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// True when nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// True while `id` awaits a reply.
    pub fn contains(&self, id: &RequestId) -> bool {
        self.pending.lock().contains_key(id)
    }
}

/// Caller's handle on one in-flight request.
///
/// Dropping it before completion removes the table entry, so a late reply
/// is treated as unmatched.
#[derive(Debug)]
pub struct PendingCall {
    id: RequestId,
    rx: oneshot::Receiver<Outcome>,
    pending: Weak<PendingMap>,
}

impl PendingCall {
    /// Correlation token to put on the wire.
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    /// Wait for the outcome.
    pub async fn wait(mut self) -> Outcome {
        match (&mut self.rx).await {
            Ok(outcome) => outcome,
            // Resolver dropped without firing: the table itself went away.
            Err(_) => Err(RequestError::ConnectionLost),
        }
    }
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.upgrade() {
            let _ = pending.lock().remove(&self.id);
        }
    }
}
