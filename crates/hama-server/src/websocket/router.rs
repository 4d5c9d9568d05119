//! Inbound frame routing.
//!
//! Malformed frames are dropped without a reply. Only `request` envelopes
//! are dispatched; everything else a peer sends is logged and ignored.

use hama_core::{Envelope, SessionId};
use tracing::{debug, instrument, warn};

use crate::executor::ToolExecutor;
use crate::websocket::registry::SessionRegistry;

/// What happened to one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Not a valid envelope; dropped.
    Malformed,
    /// Valid envelope of a type the server does not act on.
    Ignored(&'static str),
    /// Request executed; `response` enqueued.
    Responded,
    /// Request failed; `error` enqueued.
    Rejected,
    /// A reply was produced but the session could not take it.
    Undeliverable,
}

/// Handle one text frame from `session_id`.
#[instrument(skip_all, fields(session_id = %session_id, method))]
pub async fn route_frame(
    frame: &str,
    session_id: &SessionId,
    registry: &SessionRegistry,
    executor: &dyn ToolExecutor,
) -> RouteOutcome {
    let envelope = match Envelope::decode(frame) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, len = frame.len(), "dropping malformed frame");
            return RouteOutcome::Malformed;
        }
    };

    let kind = envelope.type_name();
    let Envelope::Request {
        request_id,
        method,
        params,
    } = envelope
    else {
        debug!(kind, "ignoring non-request envelope");
        return RouteOutcome::Ignored(kind);
    };

    let _ = tracing::Span::current().record("method", method.as_str());
    debug!(%request_id, "dispatching request");

    let (reply, outcome) = match executor.execute(&method, params).await {
        Ok(data) => (Envelope::response(request_id, data), RouteOutcome::Responded),
        Err(e) => {
            debug!(error = %e, "request failed");
            (
                Envelope::request_error(request_id, e.to_string()),
                RouteOutcome::Rejected,
            )
        }
    };

    match registry.send(session_id, &reply) {
        Ok(()) => outcome,
        Err(e) => {
            warn!(error = %e, "reply undeliverable");
            RouteOutcome::Undeliverable
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ExecutorError;
    use crate::websocket::registry::HelloTemplate;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use hama_core::RequestId;
    use hama_core::methods::UNSUPPORTED_METHOD;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    struct EchoExecutor;

    #[async_trait]
    impl ToolExecutor for EchoExecutor {
        async fn execute(&self, method: &str, params: Value) -> Result<Value, ExecutorError> {
            match method {
                "echo" => Ok(params),
                "fail" => Err(ExecutorError::domain("boom")),
                other => Err(ExecutorError::UnsupportedMethod {
                    method: other.to_owned(),
                }),
            }
        }
    }

    struct Fixture {
        registry: SessionRegistry,
        session: SessionId,
        rx: mpsc::Receiver<Arc<String>>,
    }

    impl Fixture {
        async fn new() -> Self {
            let registry = SessionRegistry::new(HelloTemplate {
                peer_name: "hama-test".into(),
                capabilities: json!({}),
                server_info: None,
                instructions: None,
            });
            let (tx, mut rx) = mpsc::channel(8);
            let session = registry.register(tx).unwrap();
            let _ = rx.recv().await; // hello
            Self {
                registry,
                session,
                rx,
            }
        }

        async fn route(&self, frame: &str) -> RouteOutcome {
            route_frame(frame, &self.session, &self.registry, &EchoExecutor).await
        }

        async fn reply(&mut self) -> Envelope {
            Envelope::decode(&self.rx.recv().await.unwrap()).unwrap()
        }
    }

    fn request(id: &str, method: &str, params: Value) -> String {
        Envelope::request(RequestId::from_raw(id), method, params)
            .encode()
            .unwrap()
    }

    #[tokio::test]
    async fn request_gets_response() {
        let mut fx = Fixture::new().await;
        let outcome = fx.route(&request("r1", "echo", json!({"x": 1}))).await;
        assert_eq!(outcome, RouteOutcome::Responded);
        assert_eq!(
            fx.reply().await,
            Envelope::response(RequestId::from_raw("r1"), json!({"x": 1}))
        );
    }

    #[tokio::test]
    async fn domain_failure_gets_error() {
        let mut fx = Fixture::new().await;
        assert_eq!(
            fx.route(&request("r2", "fail", json!({}))).await,
            RouteOutcome::Rejected
        );
        assert_eq!(
            fx.reply().await,
            Envelope::request_error(RequestId::from_raw("r2"), "boom")
        );
    }

    #[tokio::test]
    async fn unknown_method_is_unsupported() {
        let mut fx = Fixture::new().await;
        let _ = fx.route(&request("r3", "nope/nope", json!({}))).await;
        assert_matches!(
            fx.reply().await,
            Envelope::Error { request_id: Some(id), message }
                if id.as_str() == "r3" && message == UNSUPPORTED_METHOD
        );
    }

    #[tokio::test]
    async fn malformed_frames_get_no_reply() {
        let mut fx = Fixture::new().await;
        assert_eq!(fx.route("{not json").await, RouteOutcome::Malformed);
        assert_eq!(
            fx.route(r#"{"type":"request","method":"echo"}"#).await,
            RouteOutcome::Malformed
        );
        assert!(fx.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn non_requests_are_ignored() {
        let mut fx = Fixture::new().await;
        let ping = Envelope::ping_now().encode().unwrap();
        assert_eq!(fx.route(&ping).await, RouteOutcome::Ignored("ping"));
        assert_eq!(
            fx.route(r#"{"type":"telemetry"}"#).await,
            RouteOutcome::Ignored("unknown")
        );
        let response = Envelope::response(RequestId::from_raw("r"), json!(1))
            .encode()
            .unwrap();
        assert_eq!(fx.route(&response).await, RouteOutcome::Ignored("response"));
        assert!(fx.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn reply_to_departed_session_is_undeliverable() {
        let fx = Fixture::new().await;
        let _ = fx.registry.unregister(&fx.session);
        assert_eq!(
            fx.route(&request("r4", "echo", json!({}))).await,
            RouteOutcome::Undeliverable
        );
    }

    #[tokio::test]
    async fn requests_answered_in_arrival_order() {
        let mut fx = Fixture::new().await;
        for i in 0..5 {
            let _ = fx.route(&request(&format!("r{i}"), "echo", json!(i))).await;
        }
        for i in 0..5 {
            assert_matches!(
                fx.reply().await,
                Envelope::Response { request_id, .. } if request_id.as_str() == format!("r{i}")
            );
        }
    }
}
