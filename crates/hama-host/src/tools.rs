//! Built-in tools served by the host binary.

use std::time::Instant;

use async_trait::async_trait;
use hama_core::ToolDescriptor;
use hama_server::ExecutorError;
use hama_server::rpc::tools::{Tool, ToolCatalog, text_content};
use serde::Serialize;
use serde_json::Value;

const TOOL_VERSION: &str = "0.1.0";

/// Catalog with every built-in tool registered.
pub fn default_catalog() -> ToolCatalog {
    let catalog = ToolCatalog::new();
    catalog.register(EchoTool);
    catalog.register(DeviceInfoTool);
    catalog.register(AppContextTool::new());
    catalog
}

fn descriptor(name: &str, description: &str) -> ToolDescriptor {
    ToolDescriptor {
        name: name.into(),
        description: description.into(),
        version: Some(TOOL_VERSION.into()),
    }
}

fn json_text(value: &impl Serialize) -> Result<Value, ExecutorError> {
    serde_json::to_string_pretty(value)
        .map(text_content)
        .map_err(|e| ExecutorError::domain(format!("failed to render result: {e}")))
}

/// Returns its `text` argument.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn descriptor(&self) -> ToolDescriptor {
        descriptor("echo", "Return the given text unchanged")
    }

    async fn call(&self, arguments: Value) -> Result<Value, ExecutorError> {
        arguments
            .get("text")
            .and_then(Value::as_str)
            .map(text_content)
            .ok_or_else(|| ExecutorError::domain("text is required"))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeviceInfo {
    os: &'static str,
    family: &'static str,
    arch: &'static str,
    cpus: usize,
    hostname: Option<String>,
}

/// Describes the machine the host runs on.
pub struct DeviceInfoTool;

#[async_trait]
impl Tool for DeviceInfoTool {
    fn descriptor(&self) -> ToolDescriptor {
        descriptor("deviceInfo", "Get information about the host device")
    }

    async fn call(&self, _arguments: Value) -> Result<Value, ExecutorError> {
        let info = DeviceInfo {
            os: std::env::consts::OS,
            family: std::env::consts::FAMILY,
            arch: std::env::consts::ARCH,
            cpus: std::thread::available_parallelism().map_or(1, std::num::NonZero::get),
            hostname: std::env::var("HOSTNAME").ok().filter(|h| !h.is_empty()),
        };
        json_text(&info)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AppContext {
    name: &'static str,
    version: &'static str,
    pid: u32,
    executable: Option<String>,
    working_dir: Option<String>,
    uptime_secs: u64,
}

/// Describes the running host process.
pub struct AppContextTool {
    started: Instant,
}

impl AppContextTool {
    /// Tool whose uptime counts from now.
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for AppContextTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for AppContextTool {
    fn descriptor(&self) -> ToolDescriptor {
        descriptor("appContext", "Get information about the running host process")
    }

    async fn call(&self, _arguments: Value) -> Result<Value, ExecutorError> {
        let context = AppContext {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            pid: std::process::id(),
            executable: std::env::current_exe()
                .ok()
                .map(|p| p.display().to_string()),
            working_dir: std::env::current_dir()
                .ok()
                .map(|p| p.display().to_string()),
            uptime_secs: self.started.elapsed().as_secs(),
        };
        json_text(&context)
    }
}
