//! WebSocket session handling.

pub mod connection;
pub mod keepalive;
pub mod registry;
pub mod router;
pub mod session;
