//! Settings types. Every field has a default so partial files deserialize.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HamaSettings {
    /// Tool host settings.
    pub server: ServerSettings,
    /// Control client settings.
    pub client: ClientSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// Tool host (server) settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port (`0` picks a free port).
    pub port: u16,
    /// WebSocket upgrade path.
    pub path: String,
    /// Name announced in `hello`.
    pub peer_name: String,
    /// Server version announced in `hello.serverInfo`.
    pub version: String,
    /// Platform announced in `hello.serverInfo`.
    pub platform: String,
    /// Optional usage instructions announced in `hello`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// Static capability flags announced in `hello`.
    pub capabilities: Value,
    /// Seconds between keepalive probes.
    pub keepalive_interval_secs: u64,
    /// Per-session outbound queue depth.
    pub max_send_queue: usize,
    /// Maximum inbound frame size in bytes.
    pub max_message_size: usize,
    /// Upper bound on a single method handler run.
    pub handler_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            path: "/mcp".to_string(),
            peer_name: "hama-mcp".to_string(),
            version: "0.1.0".to_string(),
            platform: std::env::consts::OS.to_string(),
            instructions: None,
            capabilities: json!({
                "tools": true,
                "resources": true,
                "events": true,
            }),
            keepalive_interval_secs: 30,
            max_send_queue: 1024,
            max_message_size: 16 * 1024 * 1024,
            handler_timeout_secs: 60,
        }
    }
}

/// Control client settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// Default server URL.
    pub url: String,
    /// Capacity of the event and log broadcast channels.
    pub event_buffer: usize,
    /// Seconds to wait for the socket handshake.
    pub connect_timeout_secs: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8080/mcp".to_string(),
            event_buffer: 256,
            connect_timeout_secs: 10,
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default `tracing` filter directive (overridden by `RUST_LOG`).
    pub level: String,
    /// Emit JSON lines instead of the compact format.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_defaults() {
        let s = ServerSettings::default();
        assert_eq!(s.port, 8080);
        assert_eq!(s.path, "/mcp");
        assert_eq!(s.keepalive_interval_secs, 30);
        assert_eq!(s.max_message_size, 16 * 1024 * 1024);
        assert!(s.capabilities.is_object());
    }

    #[test]
    fn client_defaults() {
        let c = ClientSettings::default();
        assert_eq!(c.url, "ws://127.0.0.1:8080/mcp");
        assert_eq!(c.event_buffer, 256);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let s: HamaSettings =
            serde_json::from_str(r#"{"server":{"port":9000},"logging":{"level":"debug"}}"#)
                .unwrap();
        assert_eq!(s.server.port, 9000);
        assert_eq!(s.server.path, "/mcp");
        assert_eq!(s.logging.level, "debug");
        assert_eq!(s.client.connect_timeout_secs, 10);
    }

    #[test]
    fn camel_case_keys() {
        let v = serde_json::to_value(HamaSettings::default()).unwrap();
        assert!(v["server"].get("keepaliveIntervalSecs").is_some());
        assert!(v["server"].get("peerName").is_some());
        assert!(v["client"].get("eventBuffer").is_some());
    }
}
