//! Liveness probe.

use axum::Json;
use serde::{Deserialize, Serialize};

/// Probe path.
pub const PROBE_PATH: &str = "/test";

/// Fixed liveness payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeStatus {
    pub status: String,
    pub message: String,
}

impl ProbeStatus {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            message: "Proxy server is running".to_string(),
        }
    }
}

/// `GET /test`.
pub async fn probe_handler() -> Json<ProbeStatus> {
    Json(ProbeStatus::ok())
}
