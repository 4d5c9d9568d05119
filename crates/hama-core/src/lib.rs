//! # hama-core
//!
//! Shared building blocks for the Hama tool protocol.
//!
//! - [`envelope`]: the JSON envelope union exchanged over the socket
//! - [`ids`]: branded session and request identifiers
//! - [`errors`]: codec error type
//! - [`methods`]: method names, fixed wire messages, tool descriptors
//! - [`logging`]: `tracing` subscriber bootstrap

#![deny(unsafe_code)]

pub mod envelope;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod methods;

pub use envelope::Envelope;
pub use errors::CodecError;
pub use ids::{RequestId, SessionId};
pub use methods::ToolDescriptor;
