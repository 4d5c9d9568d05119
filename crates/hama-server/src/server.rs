//! `ToolServer`: Axum HTTP + WebSocket host.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use hama_core::{Envelope, SessionId};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::errors::{SendError, ServerError};
use crate::executor::ToolExecutor;
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::keepalive::run_keepalive;
use crate::websocket::registry::{HelloTemplate, SessionRegistry};
use crate::websocket::session::{SessionContext, run_ws_session};

/// Plain-text body of `GET /`.
pub const LIVENESS_BODY: &str = "MCP Server Running";

/// How long [`ToolServer::stop_and_wait`] waits for the server task.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Shared per-session dependencies.
    pub session: Arc<SessionContext>,
    /// When the server was created.
    pub start_time: Instant,
    /// Max inbound WebSocket message size.
    pub max_message_size: usize,
}

/// The tool host.
pub struct ToolServer {
    config: ServerConfig,
    registry: Arc<SessionRegistry>,
    executor: Arc<dyn ToolExecutor>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    running: AtomicBool,
}

impl ToolServer {
    /// Create a server that runs requests through `executor`.
    pub fn new(mut config: ServerConfig, executor: Arc<dyn ToolExecutor>) -> Self {
        config.path = normalize_ws_path(&config.path);
        let registry = Arc::new(SessionRegistry::new(HelloTemplate::from(&config)));
        Self {
            config,
            registry,
            executor,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            running: AtomicBool::new(false),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            session: Arc::new(SessionContext {
                registry: Arc::clone(&self.registry),
                executor: Arc::clone(&self.executor),
                max_send_queue: self.config.max_send_queue,
                shutdown: self.shutdown.token(),
            }),
            start_time: self.start_time,
            max_message_size: self.config.max_message_size,
        };

        Router::new()
            .route("/", get(liveness_handler))
            .route("/health", get(health_handler))
            .route(&self.config.path, get(ws_handler))
            .with_state(state)
    }

    /// Bind, start the keepalive loop and the HTTP server, and return the
    /// bound address plus a handle that completes after shutdown.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        if self.shutdown.is_shutting_down() {
            return Err(ServerError::Stopped);
        }
        if self.running.swap(true, Ordering::AcqRel) {
            warn!("listen called while already running");
            return Err(ServerError::AlreadyRunning);
        }

        let (listener, local_addr) = match self.bind().await {
            Ok(bound) => bound,
            Err(e) => {
                self.running.store(false, Ordering::Release);
                return Err(e);
            }
        };

        let router = self.router();
        let token = self.shutdown.token();
        let keepalive = tokio::spawn(run_keepalive(
            Arc::clone(&self.registry),
            self.config.keepalive_interval,
            token.clone(),
        ));

        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(e) = serve.await {
                error!(error = %e, "server error");
            }
            let _ = keepalive.await;
            info!("tool server stopped");
        });

        info!(
            addr = %local_addr,
            path = %self.config.path,
            keepalive_secs = self.config.keepalive_interval.as_secs(),
            "tool server listening"
        );
        Ok((local_addr, handle))
    }

    async fn bind(&self) -> Result<(TcpListener, SocketAddr), ServerError> {
        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;
        Ok((listener, local_addr))
    }

    /// Push an `event` to every session.
    pub fn broadcast_event(&self, kind: &str, data: Value) -> Result<usize, SendError> {
        self.registry.broadcast(&Envelope::event(kind, data))
    }

    /// Push an `event` to one session.
    pub fn send_event(&self, session_id: &SessionId, kind: &str, data: Value) -> Result<(), SendError> {
        self.registry.send(session_id, &Envelope::event(kind, data))
    }

    /// Stop accepting connections and end every session.
    pub fn stop(&self) {
        info!("tool server shutting down");
        self.shutdown.shutdown();
    }

    /// Stop, then wait up to [`SHUTDOWN_GRACE`] for the task returned by
    /// `listen` to finish. Returns `false` if it did not finish in time.
    pub async fn stop_and_wait(&self, handle: JoinHandle<()>) -> bool {
        info!("tool server shutting down");
        self.shutdown.graceful_shutdown(vec![handle], SHUTDOWN_GRACE).await
    }

    /// Whether `listen` has succeeded and `stop` has not been called.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire) && !self.shutdown.is_shutting_down()
    }

    /// Get the session registry.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// Leading slash enforced; paths that would shadow `/` or `/health` fall back to `/mcp`.
fn normalize_ws_path(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    let path = if trimmed.starts_with('/') {
        trimmed.to_owned()
    } else {
        format!("/{trimmed}")
    };
    if path == "/" || path == "/health" {
        warn!(path, "websocket path collides with a built-in route, using /mcp");
        return "/mcp".to_owned();
    }
    path
}

/// GET /
async fn liveness_handler() -> &'static str {
    LIVENESS_BODY
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let registry = &state.session.registry;
    Json(health::health_check(
        state.start_time,
        registry.len(),
        registry.dropped_frames(),
    ))
}

/// GET <path>: WebSocket upgrade.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    if state.session.shutdown.is_cancelled() {
        return (StatusCode::SERVICE_UNAVAILABLE, "shutting down").into_response();
    }
    let session = state.session;
    ws.max_message_size(state.max_message_size)
        .on_upgrade(move |socket| run_ws_session(socket, session))
}
