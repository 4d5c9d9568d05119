//! # hama-client
//!
//! Control-side half of the Hama tool protocol.
//!
//! - [`state`]: `Disconnected → Connecting → Connected → {Disconnected, Error}` machine
//! - [`correlator`]: request ID allocation and exactly-once resolution of pending calls
//! - [`transport`]: socket seam plus the `tokio-tungstenite` implementation
//! - [`client`]: [`ToolClient`], which ties the above together and exposes
//!   state, server info, log, and event streams
//! - [`requests`]: typed helpers (`tools/list`, `tools/call`, ...) built on `send`

#![deny(unsafe_code)]

pub mod client;
pub mod correlator;
pub mod errors;
pub mod events;
pub mod logs;
pub mod requests;
pub mod state;
pub mod transport;

pub use client::{ClientConfig, ServerInfo, ToolClient};
pub use errors::{ConnectError, RequestError, TransportError};
pub use events::ClientEvent;
pub use logs::{LogKind, LogMessage};
pub use state::{ConnectionState, StateObserver};
