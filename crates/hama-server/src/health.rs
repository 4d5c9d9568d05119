//! `/health` endpoint.

use serde::Serialize;
use std::time::Instant;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Live session count.
    pub sessions: usize,
    /// Outbound frames live sessions could not enqueue.
    pub dropped_frames: u64,
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, sessions: usize, dropped_frames: u64) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        sessions,
        dropped_frames,
    }
}
