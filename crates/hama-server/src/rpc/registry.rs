//! Method registry and async dispatch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, warn};

use crate::errors::ExecutorError;
use crate::executor::ToolExecutor;

/// Default upper bound on a single handler run.
pub const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(60);

/// Runs taking at least this long are logged as slow.
const SLOW_HANDLER_THRESHOLD: Duration = Duration::from_secs(5);

/// Trait implemented by every method handler.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    /// Execute the handler with the request's params.
    async fn handle(&self, params: Value) -> Result<Value, ExecutorError>;
}

/// Registry mapping method names to handlers.
pub struct MethodRegistry {
    handlers: HashMap<String, Arc<dyn MethodHandler>>,
    timeout: Duration,
}

impl MethodRegistry {
    /// Create an empty registry with the default handler timeout.
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_HANDLER_TIMEOUT)
    }

    /// Create an empty registry whose handlers are cut off after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            handlers: HashMap::new(),
            timeout,
        }
    }

    /// Register a handler for a method name, replacing any previous one.
    pub fn register(&mut self, method: &str, handler: impl MethodHandler + 'static) {
        let _ = self.handlers.insert(method.to_owned(), Arc::new(handler));
    }

    /// List all registered method names (sorted).
    pub fn methods(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolExecutor for MethodRegistry {
    async fn execute(&self, method: &str, params: Value) -> Result<Value, ExecutorError> {
        let Some(handler) = self.handlers.get(method) else {
            warn!(method, "unsupported method");
            return Err(ExecutorError::UnsupportedMethod {
                method: method.to_owned(),
            });
        };

        let start = Instant::now();
        let result = match tokio::time::timeout(self.timeout, handler.handle(params)).await {
            Ok(result) => result,
            Err(_elapsed) => {
                error!(method, timeout = ?self.timeout, "method handler timed out");
                Err(ExecutorError::domain(format!(
                    "handler for '{method}' timed out"
                )))
            }
        };

        let duration = start.elapsed();
        if duration >= SLOW_HANDLER_THRESHOLD {
            warn!(
                method,
                duration_secs = duration.as_secs_f64(),
                "slow method handler"
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    // ── Test handler implementations ────────────────────────────────

    struct EchoHandler;

    #[async_trait]
    impl MethodHandler for EchoHandler {
        async fn handle(&self, params: Value) -> Result<Value, ExecutorError> {
            Ok(params)
        }
    }

    struct FailHandler;

    #[async_trait]
    impl MethodHandler for FailHandler {
        async fn handle(&self, _params: Value) -> Result<Value, ExecutorError> {
            Err(ExecutorError::domain("boom"))
        }
    }

    struct SleepyHandler;

    #[async_trait]
    impl MethodHandler for SleepyHandler {
        async fn handle(&self, _params: Value) -> Result<Value, ExecutorError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Value::Null)
        }
    }

    // ── Tests ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn register_and_dispatch_success() {
        let mut reg = MethodRegistry::new();
        reg.register("echo", EchoHandler);
        let result = reg.execute("echo", json!({"x": 1})).await.unwrap();
        assert_eq!(result, json!({"x": 1}));
    }

    #[tokio::test]
    async fn handler_error_passes_through() {
        let mut reg = MethodRegistry::new();
        reg.register("fail", FailHandler);
        assert_matches!(
            reg.execute("fail", json!({})).await,
            Err(ExecutorError::Domain { message }) if message == "boom"
        );
    }

    #[tokio::test]
    async fn unknown_method_is_unsupported() {
        let reg = MethodRegistry::new();
        assert_matches!(
            reg.execute("nope", json!({})).await,
            Err(ExecutorError::UnsupportedMethod { method }) if method == "nope"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_handler_times_out() {
        let mut reg = MethodRegistry::with_timeout(Duration::from_secs(1));
        reg.register("sleepy", SleepyHandler);
        let err = reg.execute("sleepy", json!({})).await.unwrap_err();
        assert_eq!(err.to_string(), "handler for 'sleepy' timed out");
    }

    #[test]
    fn methods_sorted() {
        let mut reg = MethodRegistry::new();
        reg.register("tools/list", EchoHandler);
        reg.register("echo", EchoHandler);
        assert_eq!(reg.methods(), vec!["echo", "tools/list"]);
    }

    #[tokio::test]
    async fn re_register_replaces_handler() {
        let mut reg = MethodRegistry::new();
        reg.register("m", FailHandler);
        reg.register("m", EchoHandler);
        assert_eq!(reg.methods().len(), 1);
        assert!(reg.execute("m", json!(1)).await.is_ok());
    }
}
