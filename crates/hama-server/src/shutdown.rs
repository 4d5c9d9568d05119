//! Graceful shutdown coordination via `CancellationToken`.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Coordinates shutdown across the HTTP server, keepalive, and sessions.
#[derive(Debug)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Get a clone of the cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Initiate shutdown.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether a shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel the token and give `tasks` up to `grace` to finish.
    ///
    /// Returns `false` if any task was still running when `grace` ran out;
    /// those tasks are left detached.
    pub async fn graceful_shutdown(&self, tasks: Vec<JoinHandle<()>>, grace: Duration) -> bool {
        self.shutdown();
        let pending = tasks.len();
        match tokio::time::timeout(grace, futures::future::join_all(tasks)).await {
            Ok(results) => {
                let panicked = results.iter().filter(|r| r.is_err()).count();
                if panicked > 0 {
                    warn!(panicked, "server task ended abnormally");
                }
                info!(tasks = pending, "server tasks drained");
                true
            }
            Err(_) => {
                warn!(
                    tasks = pending,
                    grace_secs = grace.as_secs_f64(),
                    "server tasks still running after grace period"
                );
                false
            }
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
