//! # hama-host
//!
//! Tool host binary: loads settings, initializes logging, registers the
//! built-in tools, and serves them over WebSocket until ctrl-c.

#![deny(unsafe_code)]

mod tools;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use hama_server::rpc::registry::MethodRegistry;
use hama_server::rpc::tools::register_tool_methods;
use hama_server::{ServerConfig, ToolServer};
use hama_settings::HamaSettings;

/// Hama tool host.
#[derive(Parser, Debug)]
#[command(name = "hama-host", about = "Hama tool host")]
struct Cli {
    /// Settings file (defaults to `~/.hama/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// WebSocket path (overrides settings).
    #[arg(long)]
    path: Option<String>,

    /// Log filter directive (overrides settings; `RUST_LOG` still wins).
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON log lines.
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    /// Command-line flags take precedence over file and env settings.
    fn apply(&self, settings: &mut HamaSettings) {
        if let Some(ref host) = self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(ref path) = self.path {
            settings.server.path.clone_from(path);
        }
        if let Some(ref level) = self.log_level {
            settings.logging.level.clone_from(level);
        }
        if self.json_logs {
            settings.logging.json = true;
        }
    }
}

fn build_registry(settings: &HamaSettings) -> MethodRegistry {
    let catalog = Arc::new(tools::default_catalog());
    let mut registry =
        MethodRegistry::with_timeout(Duration::from_secs(settings.server.handler_timeout_secs));
    register_tool_methods(&mut registry, &catalog);
    registry
}

fn build_server(settings: &HamaSettings, registry: MethodRegistry) -> ToolServer {
    ToolServer::new(ServerConfig::from(&settings.server), Arc::new(registry))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let mut settings = match args.config {
        Some(ref path) => hama_settings::load_settings_from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => hama_settings::load_settings().context("Failed to load settings")?,
    };
    args.apply(&mut settings);

    if settings.logging.json {
        hama_core::logging::init_json_subscriber(&settings.logging.level);
    } else {
        hama_core::logging::init_subscriber(&settings.logging.level);
    }

    let registry = build_registry(&settings);
    let methods = registry.methods();
    let server = build_server(&settings, registry);
    let (addr, handle) = server
        .listen()
        .await
        .context("Failed to bind server")?;

    tracing::info!(
        "Hama host listening on ws://{addr}{} (peer {}, {} methods: {})",
        server.config().path,
        server.config().peer_name,
        methods.len(),
        methods.join(", ")
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    if !server.stop_and_wait(handle).await {
        tracing::warn!("Server did not stop within the grace period");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn cli_defaults_leave_settings_alone() {
        let cli = Cli::parse_from(["hama-host"]);
        let mut settings = HamaSettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert!(!settings.logging.json);
        assert!(cli.config.is_none());
    }

    #[test]
    fn cli_overrides_settings() {
        let cli = Cli::parse_from([
            "hama-host",
            "--host",
            "127.0.0.1",
            "--port",
            "0",
            "--path",
            "/tools",
            "--log-level",
            "debug",
            "--json-logs",
        ]);
        let mut settings = HamaSettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 0);
        assert_eq!(settings.server.path, "/tools");
        assert_eq!(settings.logging.level, "debug");
        assert!(settings.logging.json);
    }

    #[test]
    fn cli_config_path() {
        let cli = Cli::parse_from(["hama-host", "--config", "/tmp/hama.json"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/hama.json")));
    }

    #[test]
    fn cli_rejects_bad_port() {
        assert!(Cli::try_parse_from(["hama-host", "--port", "70000"]).is_err());
    }

    #[test]
    fn registry_serves_tool_methods() {
        let registry = build_registry(&HamaSettings::default());
        assert_eq!(
            registry.methods(),
            ["resources/list", "tools/call", "tools/list"]
        );
    }

    #[test]
    fn server_uses_settings() {
        let settings = HamaSettings::default();
        let server = build_server(&settings, build_registry(&settings));
        assert_eq!(server.config().path, "/mcp");
        assert_eq!(server.config().peer_name, "hama-mcp");
    }

    #[tokio::test]
    async fn server_graceful_shutdown() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"server":{{"host":"127.0.0.1","port":0}}}}"#).unwrap();
        let settings = hama_settings::load_settings_from_path(file.path()).unwrap();

        let server = build_server(&settings, build_registry(&settings));
        let (addr, handle) = server.listen().await.unwrap();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");

        assert!(server.stop_and_wait(handle).await);
    }
}
