//! Tool catalog and the methods that expose it.
//!
//! | method           | params                  | result                       |
//! |------------------|-------------------------|------------------------------|
//! | `tools/list`     | none                    | `{tools: [ToolDescriptor]}`  |
//! | `tools/call`     | `{name, arguments?}`    | whatever the tool returns    |
//! | `resources/list` | none                    | `{resources: []}`            |

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use hama_core::ToolDescriptor;
use hama_core::methods::{RESOURCES_LIST, TOOLS_CALL, TOOLS_LIST};
use parking_lot::RwLock;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::errors::ExecutorError;
use crate::rpc::registry::{MethodHandler, MethodRegistry};

/// A named capability a client can invoke through `tools/call`.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name, description, and version as listed by `tools/list`.
    fn descriptor(&self) -> ToolDescriptor;

    /// Run the tool. `arguments` is always a JSON object.
    async fn call(&self, arguments: Value) -> Result<Value, ExecutorError>;
}

/// Conventional tool result: one text content block.
pub fn text_content(text: impl Into<String>) -> Value {
    json!({
        "content": [
            { "type": "text", "text": text.into() }
        ]
    })
}

/// Tools keyed by name. Tools may be added while the server is running.
#[derive(Default)]
pub struct ToolCatalog {
    tools: RwLock<BTreeMap<String, Arc<dyn Tool>>>,
}

impl ToolCatalog {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `tool`, replacing any tool with the same name.
    pub fn register(&self, tool: impl Tool + 'static) {
        let name = tool.descriptor().name;
        debug!(tool = %name, "tool registered");
        let _ = self.tools.write().insert(name, Arc::new(tool));
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().get(name).cloned()
    }

    /// Descriptors of every tool, sorted by name.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.read().values().map(|t| t.descriptor()).collect()
    }

    /// Number of tools.
    pub fn len(&self) -> usize {
        self.tools.read().len()
    }

    /// True when no tools are registered.
    pub fn is_empty(&self) -> bool {
        self.tools.read().is_empty()
    }
}

/// Install `tools/list`, `tools/call`, and `resources/list` backed by `catalog`.
pub fn register_tool_methods(registry: &mut MethodRegistry, catalog: &Arc<ToolCatalog>) {
    registry.register(
        TOOLS_LIST,
        ListToolsHandler {
            catalog: Arc::clone(catalog),
        },
    );
    registry.register(
        TOOLS_CALL,
        CallToolHandler {
            catalog: Arc::clone(catalog),
        },
    );
    registry.register(RESOURCES_LIST, ListResourcesHandler);
}

struct ListToolsHandler {
    catalog: Arc<ToolCatalog>,
}

#[async_trait]
impl MethodHandler for ListToolsHandler {
    async fn handle(&self, _params: Value) -> Result<Value, ExecutorError> {
        Ok(json!({ "tools": self.catalog.descriptors() }))
    }
}

struct CallToolHandler {
    catalog: Arc<ToolCatalog>,
}

#[async_trait]
impl MethodHandler for CallToolHandler {
    async fn handle(&self, params: Value) -> Result<Value, ExecutorError> {
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ExecutorError::domain("tool name is required"))?;

        let tool = self
            .catalog
            .get(name)
            .ok_or_else(|| ExecutorError::domain(format!("unsupported tool: {name}")))?;

        let arguments = match params.get("arguments") {
            Some(Value::Object(map)) => Value::Object(map.clone()),
            _ => Value::Object(Map::new()),
        };
        debug!(tool = name, "calling tool");
        tool.call(arguments).await
    }
}

struct ListResourcesHandler;

#[async_trait]
impl MethodHandler for ListResourcesHandler {
    async fn handle(&self, _params: Value) -> Result<Value, ExecutorError> {
        Ok(json!({ "resources": [] }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ToolExecutor;
    use assert_matches::assert_matches;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor {
                name: "echo".into(),
                description: "Echo arguments".into(),
                version: Some("0.1.0".into()),
            }
        }

        async fn call(&self, arguments: Value) -> Result<Value, ExecutorError> {
            Ok(json!({ "echo": arguments }))
        }
    }

    struct BrokenTool;

    #[async_trait]
    impl Tool for BrokenTool {
        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor {
                name: "broken".into(),
                description: String::new(),
                version: None,
            }
        }

        async fn call(&self, _arguments: Value) -> Result<Value, ExecutorError> {
            Err(ExecutorError::domain("sensor unavailable"))
        }
    }

    fn make_registry() -> MethodRegistry {
        let catalog = Arc::new(ToolCatalog::new());
        catalog.register(EchoTool);
        catalog.register(BrokenTool);
        let mut registry = MethodRegistry::new();
        register_tool_methods(&mut registry, &catalog);
        registry
    }

    #[tokio::test]
    async fn list_tools() {
        let registry = make_registry();
        let result = registry.execute(TOOLS_LIST, json!({})).await.unwrap();
        assert_eq!(result["tools"][0]["name"], "broken");
        assert_eq!(result["tools"][1]["name"], "echo");
        assert_eq!(result["tools"][1]["version"], "0.1.0");
    }

    #[tokio::test]
    async fn call_tool_passes_arguments() {
        let registry = make_registry();
        let result = registry
            .execute(TOOLS_CALL, json!({"name": "echo", "arguments": {"a": 1}}))
            .await
            .unwrap();
        assert_eq!(result, json!({"echo": {"a": 1}}));
    }

    #[tokio::test]
    async fn missing_arguments_default_to_empty_object() {
        let registry = make_registry();
        let result = registry
            .execute(TOOLS_CALL, json!({"name": "echo"}))
            .await
            .unwrap();
        assert_eq!(result, json!({"echo": {}}));
    }

    #[tokio::test]
    async fn call_without_name_is_rejected() {
        let registry = make_registry();
        for params in [json!({}), json!({"name": 7}), json!({"name": "  "})] {
            assert_matches!(
                registry.execute(TOOLS_CALL, params).await,
                Err(ExecutorError::Domain { message }) if message == "tool name is required"
            );
        }
    }

    #[tokio::test]
    async fn unknown_tool_is_rejected() {
        let registry = make_registry();
        assert_matches!(
            registry.execute(TOOLS_CALL, json!({"name": "teleport"})).await,
            Err(ExecutorError::Domain { message }) if message == "unsupported tool: teleport"
        );
    }

    #[tokio::test]
    async fn tool_failure_surfaces() {
        let registry = make_registry();
        let err = registry
            .execute(TOOLS_CALL, json!({"name": "broken"}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "sensor unavailable");
    }

    #[tokio::test]
    async fn resources_list_is_empty() {
        let registry = make_registry();
        let result = registry.execute(RESOURCES_LIST, json!({})).await.unwrap();
        assert_eq!(result, json!({"resources": []}));
    }

    #[test]
    fn catalog_replaces_by_name() {
        let catalog = ToolCatalog::new();
        assert!(catalog.is_empty());
        catalog.register(EchoTool);
        catalog.register(EchoTool);
        assert_eq!(catalog.len(), 1);
        assert!(catalog.get("echo").is_some());
        assert!(catalog.get("nope").is_none());
    }

    #[test]
    fn text_content_shape() {
        assert_eq!(
            text_content("hi"),
            json!({"content": [{"type": "text", "text": "hi"}]})
        );
    }
}
