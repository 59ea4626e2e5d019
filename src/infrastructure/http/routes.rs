//! HTTP Routes
//!
//! API Endpoints:
//! - /tts       POST  文本转语音，返回 WAV 或 Ogg/Opus
//! - /health    GET   后端健康状态（就绪 200，否则 503）

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

/// 创建所有路由
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tts", post(handlers::synthesize))
        .route("/health", get(handlers::health))
}
