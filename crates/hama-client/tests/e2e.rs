//! Client against a live tool host.

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::time::timeout;

use hama_client::{ClientConfig, ClientEvent, ConnectionState, RequestError, ToolClient};
use hama_core::ToolDescriptor;
use hama_server::rpc::registry::MethodRegistry;
use hama_server::rpc::tools::{Tool, ToolCatalog, register_tool_methods, text_content};
use hama_server::{ExecutorError, ServerConfig, ToolServer};

const TIMEOUT: Duration = Duration::from_secs(5);

struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "echo".into(),
            description: "Echo the text argument".into(),
            version: Some("0.1.0".into()),
        }
    }

    async fn call(&self, arguments: Value) -> Result<Value, ExecutorError> {
        let text = arguments.get("text").and_then(Value::as_str).unwrap_or_default();
        Ok(text_content(text))
    }
}

/// Never answers.
struct StallTool;

#[async_trait]
impl Tool for StallTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "stall".into(),
            description: String::new(),
            version: None,
        }
    }

    async fn call(&self, _arguments: Value) -> Result<Value, ExecutorError> {
        std::future::pending().await
    }
}

async fn boot_server() -> (String, Arc<ToolServer>) {
    let catalog = Arc::new(ToolCatalog::new());
    catalog.register(EchoTool);
    catalog.register(StallTool);
    let mut registry = MethodRegistry::new();
    register_tool_methods(&mut registry, &catalog);

    let server = Arc::new(ToolServer::new(ServerConfig::default(), Arc::new(registry)));
    let (addr, _handle) = server.listen().await.unwrap();
    (format!("ws://{addr}/mcp"), server)
}

async fn wait_for(client: &ToolClient, pred: impl Fn(&ConnectionState) -> bool) -> ConnectionState {
    let mut observer = client.observe_state();
    timeout(TIMEOUT, async {
        loop {
            let state = observer.recv().await.expect("state stream ended");
            if pred(&state) {
                return state;
            }
        }
    })
    .await
    .expect("state never reached")
}

async fn connected_client(url: &str) -> ToolClient {
    let client = ToolClient::new(ClientConfig::default());
    client.connect(url).await.unwrap();
    let _ = wait_for(&client, ConnectionState::is_connected).await;
    client
}

#[tokio::test]
async fn connect_reaches_connected_with_server_info() {
    let (url, server) = boot_server().await;
    let client = connected_client(&url).await;

    let info = client.server_info().unwrap();
    assert_eq!(info.peer_name, "hama-mcp");
    assert!(server.registry().contains(&info.session_id));
    assert_eq!(client.state().session_id(), Some(&info.session_id));
    assert_eq!(info.server_version.unwrap()["version"], "0.1.0");
}

#[tokio::test]
async fn list_and_call_tools() {
    let (url, _server) = boot_server().await;
    let client = connected_client(&url).await;

    let tools = client.list_tools().await.unwrap();
    let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["echo", "stall"]);
    assert_eq!(tools[0].version.as_deref(), Some("0.1.0"));

    let result = client.call_tool("echo", json!({"text": "hello"})).await.unwrap();
    assert_eq!(result["content"][0]["text"], "hello");
    assert_eq!(client.pending_requests(), 0);
}

#[tokio::test]
async fn concurrent_requests_resolve_independently() {
    let (url, _server) = boot_server().await;
    let client = connected_client(&url).await;

    let calls = (0..10).map(|i| {
        let client = client.clone();
        tokio::spawn(async move {
            client
                .call_tool("echo", json!({"text": i.to_string()}))
                .await
                .map(|v| v["content"][0]["text"].as_str().map(str::to_owned))
        })
    });
    for (i, call) in calls.collect::<Vec<_>>().into_iter().enumerate() {
        let text = call.await.unwrap().unwrap();
        assert_eq!(text.as_deref(), Some(i.to_string().as_str()));
    }
}

#[tokio::test]
async fn remote_errors_surface_their_message() {
    let (url, _server) = boot_server().await;
    let client = connected_client(&url).await;

    let err = client.call_tool("missing", json!({})).await.unwrap_err();
    assert_eq!(err.remote_message(), Some("unsupported tool: missing"));

    let err = client.send("bogus/method", json!({})).await.unwrap_err();
    assert_matches!(err, RequestError::Remote { ref message } if message == "unsupported method");

    let resources = client.list_resources().await.unwrap();
    assert_eq!(resources, json!({"resources": []}));
}

#[tokio::test]
async fn server_events_reach_subscribers() {
    let (url, server) = boot_server().await;
    let client = connected_client(&url).await;
    let mut events = client.subscribe_events();

    let delivered = server
        .broadcast_event("resources-changed", json!({"resources": ["r"]}))
        .unwrap();
    assert_eq!(delivered, 1);

    let event = timeout(TIMEOUT, events.recv()).await.unwrap().unwrap();
    assert_matches!(event, ClientEvent::ResourcesChanged(data) if data["resources"][0] == "r");
}

#[tokio::test]
async fn disconnect_then_requests_fail_fast() {
    let (url, server) = boot_server().await;
    let client = connected_client(&url).await;

    client.disconnect().await;
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(client.server_info().is_none());
    assert_matches!(
        client.list_tools().await,
        Err(RequestError::NotConnected)
    );

    timeout(TIMEOUT, async {
        while !server.registry().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("server never dropped the session");
}

#[tokio::test]
async fn reconnect_gets_a_new_session() {
    let (url, _server) = boot_server().await;
    let client = connected_client(&url).await;
    let first = client.server_info().unwrap().session_id;

    client.disconnect().await;
    client.connect(&url).await.unwrap();
    let _ = wait_for(&client, ConnectionState::is_connected).await;
    let second = client.server_info().unwrap().session_id;

    assert_ne!(first, second);
    assert_eq!(client.list_tools().await.unwrap().len(), 2);
}

#[tokio::test]
async fn server_shutdown_fails_pending_requests() {
    let (url, server) = boot_server().await;
    let client = connected_client(&url).await;

    let stalled = {
        let client = client.clone();
        tokio::spawn(async move { client.call_tool("stall", json!({})).await })
    };
    timeout(TIMEOUT, async {
        while client.pending_requests() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    server.stop();

    let outcome = timeout(TIMEOUT, stalled).await.unwrap().unwrap();
    assert_matches!(outcome, Err(RequestError::ConnectionLost));
    let state = wait_for(&client, ConnectionState::is_terminal).await;
    assert!(!state.is_connected());
    assert_eq!(client.pending_requests(), 0);
}

#[tokio::test]
async fn connect_to_closed_port_enters_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = ToolClient::new(ClientConfig::default());
    assert!(client.connect(&format!("ws://{addr}/mcp")).await.is_err());
    assert_matches!(client.state(), ConnectionState::Error { .. });
    assert!(client.logs().iter().any(|l| l.message.starts_with("connection failed")));
}
