//! Wire envelope: one JSON object per text frame, discriminated by `type`.
//!
//! | `type`     | direction        | fields                                                   |
//! |------------|------------------|----------------------------------------------------------|
//! | `request`  | client → server  | `requestId`, `method`, `params`                          |
//! | `response` | server → client  | `requestId`, `data`                                      |
//! | `error`    | server → client  | `requestId?`, `message`                                  |
//! | `event`    | server → client  | `kind`, `data`                                           |
//! | `hello`    | server → client  | `sessionId`, `peerName`, `capabilities`, `serverInfo?`, `instructions?` |
//! | `ping`     | server → client  | `timestamp` (unix millis)                                |
//!
//! Any other `type` decodes to [`Envelope::Unknown`] rather than failing.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::CodecError;
use crate::ids::{RequestId, SessionId};

/// One protocol message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Envelope {
    /// Client asks the server to run `method`.
    #[serde(rename_all = "camelCase")]
    Request {
        /// Correlation token echoed by the reply.
        request_id: RequestId,
        /// Method name (e.g. `tools/list`).
        method: String,
        /// Method input; an empty object when absent.
        #[serde(default = "empty_object")]
        params: Value,
    },
    /// Successful reply to a request.
    #[serde(rename_all = "camelCase")]
    Response {
        /// Token of the request being answered.
        request_id: RequestId,
        /// Opaque result payload.
        #[serde(default)]
        data: Value,
    },
    /// Failure, either tied to a request or connection-level.
    #[serde(rename_all = "camelCase")]
    Error {
        /// Present when the failure answers a specific request.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<RequestId>,
        /// Human-readable reason.
        message: String,
    },
    /// Unsolicited server push.
    #[serde(rename_all = "camelCase")]
    Event {
        /// Event kind (e.g. `resources-changed`).
        kind: String,
        /// Event payload.
        #[serde(default)]
        data: Value,
    },
    /// First frame on every session; establishes the session identity.
    #[serde(rename_all = "camelCase")]
    Hello {
        /// Identity assigned by the server.
        session_id: SessionId,
        /// Display name of the serving peer.
        peer_name: String,
        /// Static capability flags.
        #[serde(default = "empty_object")]
        capabilities: Value,
        /// Version/platform block describing the server.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        server_info: Option<Value>,
        /// Free-form usage instructions for the client.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        instructions: Option<String>,
    },
    /// Keepalive probe; no reply expected.
    Ping {
        /// Send time in unix milliseconds.
        timestamp: i64,
    },
    /// A well-formed object whose `type` this build does not know.
    #[serde(other)]
    Unknown,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl Envelope {
    /// Parse a text frame.
    pub fn decode(frame: &str) -> Result<Self, CodecError> {
        serde_json::from_str(frame).map_err(CodecError::Malformed)
    }

    /// Serialize to a text frame.
    pub fn encode(&self) -> Result<String, CodecError> {
        serde_json::to_string(self).map_err(CodecError::Encode)
    }

    /// Build a `request` envelope.
    pub fn request(request_id: RequestId, method: impl Into<String>, params: Value) -> Self {
        Self::Request {
            request_id,
            method: method.into(),
            params,
        }
    }

    /// Build a `response` envelope.
    pub fn response(request_id: RequestId, data: Value) -> Self {
        Self::Response { request_id, data }
    }

    /// Build an `error` envelope answering `request_id`.
    pub fn request_error(request_id: RequestId, message: impl Into<String>) -> Self {
        Self::Error {
            request_id: Some(request_id),
            message: message.into(),
        }
    }

    /// Build a connection-level `error` envelope.
    pub fn connection_error(message: impl Into<String>) -> Self {
        Self::Error {
            request_id: None,
            message: message.into(),
        }
    }

    /// Build an `event` envelope.
    pub fn event(kind: impl Into<String>, data: Value) -> Self {
        Self::Event {
            kind: kind.into(),
            data,
        }
    }

    /// Build a `ping` stamped with the current time.
    pub fn ping_now() -> Self {
        Self::Ping {
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Wire name of this envelope's `type`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Request { .. } => "request",
            Self::Response { .. } => "response",
            Self::Error { .. } => "error",
            Self::Event { .. } => "event",
            Self::Hello { .. } => "hello",
            Self::Ping { .. } => "ping",
            Self::Unknown => "unknown",
        }
    }

    /// Correlation token, if this envelope carries one.
    pub fn request_id(&self) -> Option<&RequestId> {
        match self {
            Self::Request { request_id, .. } | Self::Response { request_id, .. } => {
                Some(request_id)
            }
            Self::Error { request_id, .. } => request_id.as_ref(),
            Self::Event { .. } | Self::Hello { .. } | Self::Ping { .. } | Self::Unknown => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn request_wire_shape() {
        let env = Envelope::request(
            RequestId::from_raw("r1"),
            "tools/call",
            json!({"name": "echo", "arguments": {}}),
        );
        let v: Value = serde_json::from_str(&env.encode().unwrap()).unwrap();
        assert_eq!(v["type"], "request");
        assert_eq!(v["requestId"], "r1");
        assert_eq!(v["method"], "tools/call");
        assert_eq!(v["params"]["name"], "echo");
    }

    #[test]
    fn request_without_params_defaults_to_empty_object() {
        let env = Envelope::decode(r#"{"type":"request","requestId":"r2","method":"tools/list"}"#)
            .unwrap();
        assert_matches!(env, Envelope::Request { params, .. } if params == json!({}));
    }

    #[test]
    fn request_requires_request_id() {
        let err = Envelope::decode(r#"{"type":"request","method":"tools/list"}"#).unwrap_err();
        assert_matches!(err, CodecError::Malformed(_));
    }

    #[test]
    fn response_decodes() {
        let env = Envelope::decode(r#"{"type":"response","requestId":"r3","data":{"tools":[]}}"#)
            .unwrap();
        assert_eq!(
            env,
            Envelope::response(RequestId::from_raw("r3"), json!({"tools": []}))
        );
    }

    #[test]
    fn error_with_request_id() {
        let env =
            Envelope::decode(r#"{"type":"error","requestId":"r4","message":"boom"}"#).unwrap();
        assert_eq!(env.request_id().map(RequestId::as_str), Some("r4"));
        assert_matches!(env, Envelope::Error { message, .. } if message == "boom");
    }

    #[test]
    fn connection_level_error_omits_request_id() {
        let json = Envelope::connection_error("shutting down").encode().unwrap();
        assert!(!json.contains("requestId"));
        let back = Envelope::decode(&json).unwrap();
        assert_matches!(back, Envelope::Error { request_id: None, .. });
    }

    #[test]
    fn event_has_no_request_id() {
        let env = Envelope::event("resources-changed", json!({"resources": []}));
        assert!(env.request_id().is_none());
        let v: Value = serde_json::from_str(&env.encode().unwrap()).unwrap();
        assert_eq!(v["type"], "event");
        assert_eq!(v["kind"], "resources-changed");
        assert!(v.get("requestId").is_none());
    }

    #[test]
    fn hello_wire_shape() {
        let env = Envelope::Hello {
            session_id: SessionId::from_raw("sess_1"),
            peer_name: "hama-mcp".into(),
            capabilities: json!({"screenCapture": true}),
            server_info: Some(json!({"version": "0.1.0"})),
            instructions: None,
        };
        let v: Value = serde_json::from_str(&env.encode().unwrap()).unwrap();
        assert_eq!(v["type"], "hello");
        assert_eq!(v["sessionId"], "sess_1");
        assert_eq!(v["peerName"], "hama-mcp");
        assert_eq!(v["capabilities"]["screenCapture"], true);
        assert_eq!(v["serverInfo"]["version"], "0.1.0");
        assert!(v.get("instructions").is_none());
    }

    #[test]
    fn minimal_hello_decodes() {
        let env =
            Envelope::decode(r#"{"type":"hello","sessionId":"s","peerName":"p"}"#).unwrap();
        assert_matches!(
            env,
            Envelope::Hello { capabilities, server_info: None, instructions: None, .. }
                if capabilities == json!({})
        );
    }

    #[test]
    fn ping_carries_timestamp() {
        let env = Envelope::ping_now();
        assert_matches!(env, Envelope::Ping { timestamp } if timestamp > 0);
        assert_eq!(env.type_name(), "ping");
    }

    #[test]
    fn unknown_type_is_a_variant_not_an_error() {
        let env = Envelope::decode(r#"{"type":"mcp-log","data":{"level":"info"}}"#).unwrap();
        assert_eq!(env, Envelope::Unknown);
        assert_eq!(env.type_name(), "unknown");
    }

    #[test]
    fn malformed_frames_fail() {
        assert_matches!(Envelope::decode("{not json"), Err(CodecError::Malformed(_)));
        assert_matches!(Envelope::decode("[1,2,3]"), Err(CodecError::Malformed(_)));
        assert_matches!(Envelope::decode(""), Err(CodecError::Malformed(_)));
        assert_matches!(
            Envelope::decode(r#"{"requestId":"r"}"#),
            Err(CodecError::Malformed(_))
        );
    }
}
