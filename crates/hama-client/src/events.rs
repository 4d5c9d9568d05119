//! Server push classification.
//!
//! `log` and `stderr` events feed the client log; everything else is
//! surfaced as a [`ClientEvent`].

use serde_json::Value;

use crate::logs::{LogKind, LogMessage};

/// Event kind: the server's resource set changed.
pub const RESOURCES_CHANGED: &str = "resources-changed";
/// Event kind: the server's active backend changed.
pub const SERVER_CHANGED: &str = "server-changed";
/// Event kind: a server log line.
pub const LOG: &str = "log";
/// Event kind: a line from the server's stderr.
pub const STDERR: &str = "stderr";

/// Unsolicited server push, as seen by client consumers.
#[derive(Clone, Debug, PartialEq)]
pub enum ClientEvent {
    /// `resources-changed` with its payload.
    ResourcesChanged(Value),
    /// `server-changed`; carries the new server name.
    ServerChanged(String),
    /// Any other kind.
    Other {
        /// Event kind.
        kind: String,
        /// Event payload.
        data: Value,
    },
}

/// Where an inbound event goes.
#[derive(Debug, PartialEq)]
pub(crate) enum Routed {
    Event(ClientEvent),
    Log(LogMessage),
}

pub(crate) fn route_event(kind: String, data: Value) -> Routed {
    match kind.as_str() {
        RESOURCES_CHANGED => Routed::Event(ClientEvent::ResourcesChanged(data)),
        SERVER_CHANGED => {
            let name = data
                .get("serverName")
                .or_else(|| data.get("server"))
                .and_then(Value::as_str)
                .map_or_else(|| data.to_string(), str::to_owned);
            Routed::Event(ClientEvent::ServerChanged(name))
        }
        LOG | STDERR => {
            let log_kind = if kind == STDERR {
                LogKind::Stderr
            } else {
                LogKind::Log
            };
            let level = data.get("level").and_then(Value::as_str).map(str::to_owned);
            let message = match data.get("message") {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => data.as_str().map_or_else(|| data.to_string(), str::to_owned),
            };
            Routed::Log(LogMessage::now(log_kind, level, message))
        }
        _ => Routed::Event(ClientEvent::Other { kind, data }),
    }
}
