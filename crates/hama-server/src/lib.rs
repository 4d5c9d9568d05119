//! # hama-server
//!
//! Tool host side of the Hama protocol.
//!
//! - [`websocket`]: per-session handles, the session registry, keepalive,
//!   inbound frame routing, and the per-socket session loop
//! - [`executor`]: the seam between routing and whatever actually runs methods
//! - [`rpc`]: method registry with handler timeouts, plus the tool catalog
//!   that serves `tools/list`, `tools/call`, and `resources/list`
//! - [`server`]: Axum router (`/`, `/health`, WebSocket path) and `listen`
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod executor;
pub mod health;
pub mod rpc;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use errors::{ExecutorError, SendError, ServerError};
pub use executor::ToolExecutor;
pub use server::ToolServer;
pub use websocket::registry::SessionRegistry;
