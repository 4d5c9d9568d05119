//! Client error types.

use hama_core::CodecError;
use thiserror::Error;

/// Socket-level failure.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The handshake failed.
    #[error("connect failed: {0}")]
    Connect(String),
    /// The handshake did not finish within the configured timeout.
    #[error("connect timed out")]
    Timeout,
    /// The socket is closed; nothing can be written.
    #[error("transport closed")]
    Closed,
    /// The socket reported an I/O or protocol error.
    #[error("socket error: {0}")]
    Socket(String),
}

/// Why `connect` did not produce a session.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// Another connect is in flight or a session is already live.
    #[error("already connecting or connected")]
    AlreadyActive,
    /// `disconnect` ran while the handshake was in progress.
    #[error("connect cancelled by disconnect")]
    Cancelled,
    /// The transport could not be opened.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Outcome of a request that did not produce a `response`.
#[derive(Debug, Error)]
pub enum RequestError {
    /// No live session when the request was issued.
    #[error("not connected")]
    NotConnected,
    /// The session ended before a reply arrived.
    #[error("connection lost")]
    ConnectionLost,
    /// The server answered with an `error` envelope.
    #[error("{message}")]
    Remote {
        /// Server-supplied reason.
        message: String,
    },
    /// The frame could not be written.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The request could not be encoded.
    #[error(transparent)]
    Encode(#[from] CodecError),
}

impl RequestError {
    /// Remote message, if the server rejected the request.
    pub fn remote_message(&self) -> Option<&str> {
        match self {
            Self::Remote { message } => Some(message),
            _ => None,
        }
    }
}
