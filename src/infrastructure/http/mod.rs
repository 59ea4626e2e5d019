//! HTTP Layer - RESTful API
//!
//! - POST /tts      文本转语音
//! - GET  /health   后端健康状态

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use routes::create_routes;
pub use server::{build_router, HttpServer, ServerConfig};
pub use state::AppState;
