//! Method names, fixed wire messages, and shared payload shapes.

use serde::{Deserialize, Serialize};

// ── Method names ────────────────────────────────────────────────────

/// List the tools the host offers.
pub const TOOLS_LIST: &str = "tools/list";
/// Run one tool.
pub const TOOLS_CALL: &str = "tools/call";
/// List prompt templates.
pub const PROMPTS_LIST: &str = "prompts/list";
/// Render one prompt template.
pub const PROMPTS_GET: &str = "prompts/get";
/// List resources.
pub const RESOURCES_LIST: &str = "resources/list";
/// List backends a proxying host can switch between.
pub const SERVERS_LIST: &str = "servers/list";
/// Switch the active backend.
pub const SERVERS_SWITCH: &str = "servers/switch";

// ── Wire messages ───────────────────────────────────────────────────

/// `error.message` for a method no handler claims.
pub const UNSUPPORTED_METHOD: &str = "unsupported method";

/// One entry of a `tools/list` reply.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    /// Name passed to `tools/call`.
    pub name: String,
    /// What the tool does.
    #[serde(default)]
    pub description: String,
    /// Tool version, if the host reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}
