//! Server error types.

use hama_core::{CodecError, SessionId};
use thiserror::Error;

/// Why a method produced no result.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// No handler claims the method.
    #[error("unsupported method")]
    UnsupportedMethod {
        /// The method that was asked for.
        method: String,
    },
    /// The handler ran and failed.
    #[error("{message}")]
    Domain {
        /// Reason sent back to the client verbatim.
        message: String,
    },
}

impl ExecutorError {
    /// Shorthand for [`ExecutorError::Domain`].
    pub fn domain(message: impl Into<String>) -> Self {
        Self::Domain {
            message: message.into(),
        }
    }
}

/// Failure to enqueue a frame for a session.
#[derive(Debug, Error)]
pub enum SendError {
    /// The session is not registered (never was, or already removed).
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),
    /// The session's writer has gone away.
    #[error("session channel closed")]
    Closed,
    /// The session's outbound queue is full.
    #[error("session send queue full")]
    Full,
    /// The envelope could not be serialized.
    #[error(transparent)]
    Encode(#[from] CodecError),
}

/// `listen` failure.
#[derive(Debug, Error)]
pub enum ServerError {
    /// `listen` was called while the server is already running.
    #[error("server already running")]
    AlreadyRunning,
    /// The server was shut down and cannot be restarted.
    #[error("server has been shut down")]
    Stopped,
    /// The listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was attempted.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}
