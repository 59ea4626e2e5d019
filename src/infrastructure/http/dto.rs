//! Data Transfer Objects

use serde::{Deserialize, Serialize};

use crate::application::BackendStatus;

// ============================================================================
// TTS DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct TtsRequest {
    pub text: String,
}

// ============================================================================
// Health DTOs
// ============================================================================

#[derive(Debug, Serialize)]
pub struct BackendInfo {
    pub kind: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" 或 "unavailable"
    pub status: &'static str,
    pub ready: bool,
    pub backend: BackendInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub output_format: String,
    pub checked_at: String,
    pub version: &'static str,
}

impl From<BackendStatus> for HealthResponse {
    fn from(status: BackendStatus) -> Self {
        Self {
            status: if status.ready { "ok" } else { "unavailable" },
            ready: status.ready,
            backend: BackendInfo {
                kind: status.backend.kind.to_string(),
                name: status.backend.name,
            },
            error: status.error,
            output_format: status.output_format.to_string(),
            checked_at: status.checked_at.to_rfc3339(),
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}
