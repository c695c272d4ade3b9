//! `/api/health` endpoint.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Live WebSocket subscribers.
    pub ws_clients: usize,
    /// When the response was built.
    pub timestamp: DateTime<Utc>,
    /// Seconds since the server started.
    pub uptime_secs: u64,
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, ws_clients: usize) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        ws_clients,
        timestamp: Utc::now(),
        uptime_secs: start_time.elapsed().as_secs(),
    }
}
