//! Method execution seam.

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::ExecutorError;

/// Runs a named method against JSON params.
///
/// The router calls this once per inbound request and turns the outcome
/// into a `response` or an `error` envelope.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Execute `method` with `params`.
    async fn execute(&self, method: &str, params: Value) -> Result<Value, ExecutorError>;
}
