//! Health Handler

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::application::GetBackendStatus;
use crate::infrastructure::http::dto::HealthResponse;
use crate::infrastructure::http::state::AppState;

/// 健康检查：后端可用时 200，否则 503
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let status = state.backend_status_handler.handle(GetBackendStatus).await;
    let code = if status.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(HealthResponse::from(status)))
}
