//! Server configuration.

use std::time::Duration;

use hama_settings::ServerSettings;
use serde_json::{Value, json};

/// Configuration for the tool host.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind (`0` picks a free port).
    pub port: u16,
    /// WebSocket upgrade path.
    pub path: String,
    /// Name announced in `hello`.
    pub peer_name: String,
    /// Version announced in `hello.serverInfo`.
    pub version: String,
    /// Platform announced in `hello.serverInfo`.
    pub platform: String,
    /// Capability flags announced in `hello`.
    pub capabilities: Value,
    /// Usage instructions announced in `hello`.
    pub instructions: Option<String>,
    /// Time between keepalive probes.
    pub keepalive_interval: Duration,
    /// Per-session outbound queue depth.
    pub max_send_queue: usize,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Upper bound on one method handler run.
    pub handler_timeout: Duration,
}

impl ServerConfig {
    /// `hello.serverInfo` block.
    pub fn server_info(&self) -> Value {
        json!({
            "version": self.version,
            "platform": self.platform,
        })
    }

    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        let mut config = Self::from(&ServerSettings::default());
        config.host = "127.0.0.1".into();
        config.port = 0;
        config
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(s: &ServerSettings) -> Self {
        Self {
            host: s.host.clone(),
            port: s.port,
            path: s.path.clone(),
            peer_name: s.peer_name.clone(),
            version: s.version.clone(),
            platform: s.platform.clone(),
            capabilities: s.capabilities.clone(),
            instructions: s.instructions.clone(),
            keepalive_interval: Duration::from_secs(s.keepalive_interval_secs),
            max_send_queue: s.max_send_queue.max(1),
            max_message_size: s.max_message_size,
            handler_timeout: Duration::from_secs(s.handler_timeout_secs),
        }
    }
}
