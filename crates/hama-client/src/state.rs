//! Connection lifecycle.
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──hello──▶ Connected
//!      ▲                        │                    │
//!      │                        ├──transport error───┼──▶ Error ──connect──▶ Connecting
//!      └─────transport closed───┴────────────────────┴─────┘
//! ```
//!
//! [`next_state`] is the pure transition table; [`StateMachine`] holds the
//! current state and fans each transition out to observers in order.

use hama_core::SessionId;
use tokio::sync::mpsc;

/// Where the client is in its connection lifecycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket.
    Disconnected,
    /// Socket opening or open, waiting for `hello`.
    Connecting,
    /// `hello` received; requests may be sent.
    Connected {
        /// Server-assigned session identity.
        session_id: SessionId,
        /// Display name of the server.
        peer_name: String,
    },
    /// The transport failed.
    Error {
        /// Transport-supplied reason.
        message: String,
    },
}

impl ConnectionState {
    /// True only in `Connected`.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    /// Session identity while connected.
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            Self::Connected { session_id, .. } => Some(session_id),
            _ => None,
        }
    }

    /// True in states that end a session (`Disconnected`, `Error`).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Error { .. })
    }
}

/// Input to the state machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StateTrigger {
    /// `connect` was called.
    ConnectRequested,
    /// The server's `hello` arrived.
    HelloReceived {
        /// Session identity from `hello`.
        session_id: SessionId,
        /// Peer name from `hello`.
        peer_name: String,
    },
    /// The transport reported a failure.
    TransportError(String),
    /// The transport closed, locally or remotely.
    TransportClosed,
}

/// Transition table. `None` means the trigger is ignored in `current`.
pub fn next_state(current: &ConnectionState, trigger: StateTrigger) -> Option<ConnectionState> {
    use ConnectionState as S;
    use StateTrigger as T;

    match (current, trigger) {
        (S::Disconnected | S::Error { .. }, T::ConnectRequested) => Some(S::Connecting),
        (
            S::Connecting,
            T::HelloReceived {
                session_id,
                peer_name,
            },
        ) => Some(S::Connected {
            session_id,
            peer_name,
        }),
        (S::Connecting | S::Connected { .. }, T::TransportError(message)) => {
            Some(S::Error { message })
        }
        (S::Connecting | S::Connected { .. } | S::Error { .. }, T::TransportClosed) => {
            Some(S::Disconnected)
        }
        _ => None,
    }
}

/// Receives every state the client enters, in order.
///
/// The first item is the state current at subscription time.
#[derive(Debug)]
pub struct StateObserver {
    rx: mpsc::UnboundedReceiver<ConnectionState>,
}

impl StateObserver {
    /// Wait for the next state. `None` once the client is dropped.
    pub async fn recv(&mut self) -> Option<ConnectionState> {
        self.rx.recv().await
    }

    /// Next already-delivered state, if any.
    pub fn try_recv(&mut self) -> Option<ConnectionState> {
        self.rx.try_recv().ok()
    }
}

/// Current state plus the observer fan-out.
///
/// Callers serialize access (the client keeps it under a mutex), so every
/// observer sees the same sequence.
#[derive(Debug)]
pub(crate) struct StateMachine {
    current: ConnectionState,
    observers: Vec<mpsc::UnboundedSender<ConnectionState>>,
}

impl StateMachine {
    pub(crate) fn new() -> Self {
        Self {
            current: ConnectionState::Disconnected,
            observers: Vec::new(),
        }
    }

    pub(crate) fn current(&self) -> &ConnectionState {
        &self.current
    }

    /// Apply `trigger`; on a transition, publish and return the new state.
    pub(crate) fn apply(&mut self, trigger: StateTrigger) -> Option<ConnectionState> {
        let next = next_state(&self.current, trigger)?;
        tracing::debug!(from = ?self.current, to = ?next, "connection state transition");
        self.current = next.clone();
        self.observers.retain(|tx| tx.send(next.clone()).is_ok());
        Some(next)
    }

    pub(crate) fn subscribe(&mut self) -> StateObserver {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(self.current.clone());
        self.observers.push(tx);
        StateObserver { rx }
    }
}
