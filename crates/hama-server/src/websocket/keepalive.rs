//! Periodic `ping` to every session; a session whose send fails is evicted.

use std::sync::Arc;
use std::time::Duration;

use hama_core::{Envelope, SessionId};
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::SendError;
use crate::websocket::registry::SessionRegistry;

/// Outcome of the keepalive loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeepaliveResult {
    /// The loop was cancelled externally.
    Cancelled,
}

/// What one keepalive pass did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct KeepaliveTick {
    /// Sessions that accepted the ping.
    pub pinged: usize,
    /// Sessions removed because the ping could not be sent.
    pub evicted: Vec<SessionId>,
}

/// Ping every registered session once.
///
/// A session unregistered concurrently is skipped, not counted as evicted.
pub fn tick(registry: &SessionRegistry) -> KeepaliveTick {
    let frame = match Envelope::ping_now().encode() {
        Ok(frame) => Arc::new(frame),
        Err(e) => {
            warn!(error = %e, "failed to encode ping");
            return KeepaliveTick::default();
        }
    };

    let mut result = KeepaliveTick::default();
    for id in registry.session_ids() {
        match registry.send_frame(&id, Arc::clone(&frame)) {
            Ok(()) => result.pinged += 1,
            Err(SendError::SessionNotFound(_)) => {}
            Err(e) => {
                warn!(session_id = %id, error = %e, "keepalive failed, evicting session");
                if registry.unregister(&id) {
                    result.evicted.push(id);
                }
            }
        }
    }
    result
}

/// Run [`tick`] every `interval` until `cancel` fires.
///
/// The first ping goes out one full interval after start.
pub async fn run_keepalive(
    registry: Arc<SessionRegistry>,
    interval: Duration,
    cancel: CancellationToken,
) -> KeepaliveResult {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
    // Skip the immediate first tick
    let _ = ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let pass = tick(&registry);
                debug!(pinged = pass.pinged, evicted = pass.evicted.len(), "keepalive pass");
            }
            () = cancel.cancelled() => {
                return KeepaliveResult::Cancelled;
            }
        }
    }
}
