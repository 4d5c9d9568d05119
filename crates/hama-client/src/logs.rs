//! Client application log: an append-only record of what the client saw,
//! separate from `tracing` output, meant for display to an operator.

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;

/// Entries retained for [`LogStream::snapshot`]; older ones are dropped.
pub const MAX_RETAINED_LOGS: usize = 1000;

/// Source of a log line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    /// Informational line from the client or a server `log` event.
    Log,
    /// Failure seen by the client or reported by the server.
    Error,
    /// Server `stderr` event.
    Stderr,
}

/// One log line.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogMessage {
    /// Source of the line.
    pub kind: LogKind,
    /// Level reported by the server, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Text.
    pub message: String,
    /// Unix millis when the client recorded it.
    pub timestamp_ms: i64,
}

impl LogMessage {
    /// Line stamped with the current time.
    pub fn now(kind: LogKind, level: Option<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            level,
            message: message.into(),
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Bounded history plus live fan-out.
#[derive(Debug)]
pub(crate) struct LogStream {
    history: Mutex<VecDeque<LogMessage>>,
    tx: broadcast::Sender<LogMessage>,
}

impl LogStream {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            history: Mutex::new(VecDeque::new()),
            tx,
        }
    }

    pub(crate) fn push(&self, entry: LogMessage) {
        let mut history = self.history.lock();
        if history.len() >= MAX_RETAINED_LOGS {
            let _ = history.pop_front();
        }
        history.push_back(entry.clone());
        // Sent under the lock so subscribers see history order.
        let _ = self.tx.send(entry);
    }

    pub(crate) fn info(&self, message: impl Into<String>) {
        self.push(LogMessage::now(LogKind::Log, None, message));
    }

    pub(crate) fn error(&self, message: impl Into<String>) {
        self.push(LogMessage::now(LogKind::Error, None, message));
    }

    pub(crate) fn snapshot(&self) -> Vec<LogMessage> {
        self.history.lock().iter().cloned().collect()
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<LogMessage> {
        self.tx.subscribe()
    }
}
