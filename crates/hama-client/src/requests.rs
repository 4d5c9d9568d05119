//! Typed wrappers over [`ToolClient::send`] for the methods a tool host serves.

use hama_core::ToolDescriptor;
use hama_core::methods::{
    PROMPTS_GET, PROMPTS_LIST, RESOURCES_LIST, SERVERS_LIST, SERVERS_SWITCH, TOOLS_CALL,
    TOOLS_LIST,
};
use serde_json::{Value, json};

use crate::client::ToolClient;
use crate::errors::RequestError;

impl ToolClient {
    /// `tools/list`, decoded into descriptors.
    ///
    /// Entries that do not parse are skipped.
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, RequestError> {
        let data = self.send(TOOLS_LIST, json!({})).await?;
        Ok(parse_tools(&data))
    }

    /// `tools/call` with `name` and `arguments`; returns the raw result.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, RequestError> {
        self.send(TOOLS_CALL, json!({ "name": name, "arguments": arguments }))
            .await
    }

    /// `prompts/list`.
    pub async fn list_prompts(&self) -> Result<Value, RequestError> {
        self.send(PROMPTS_LIST, json!({})).await
    }

    /// `prompts/get` with `name` and `arguments`.
    pub async fn get_prompt(&self, name: &str, arguments: Value) -> Result<Value, RequestError> {
        self.send(PROMPTS_GET, json!({ "name": name, "arguments": arguments }))
            .await
    }

    /// `resources/list`.
    pub async fn list_resources(&self) -> Result<Value, RequestError> {
        self.send(RESOURCES_LIST, json!({})).await
    }

    /// `servers/list`.
    pub async fn list_servers(&self) -> Result<Value, RequestError> {
        self.send(SERVERS_LIST, json!({})).await
    }

    /// `servers/switch` to `server_name`.
    pub async fn switch_server(&self, server_name: &str) -> Result<Value, RequestError> {
        self.send(SERVERS_SWITCH, json!({ "serverName": server_name }))
            .await
    }
}

/// Accepts `{"tools": [...]}` or a bare array.
fn parse_tools(data: &Value) -> Vec<ToolDescriptor> {
    let list = data.get("tools").unwrap_or(data);
    list.as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}
