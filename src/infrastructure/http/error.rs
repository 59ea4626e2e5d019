//! HTTP Error Handling
//!
//! 把流水线错误映射为 HTTP 状态码和统一的错误响应体

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::application::PipelineError;

/// 统一错误响应格式
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub errno: i32,
    pub error: String,
    pub data: Option<()>,
}

impl ErrorResponse {
    pub fn new(errno: i32, error: impl Into<String>) -> Self {
        Self {
            errno,
            error: error.into(),
            data: None,
        }
    }
}

/// 错误码定义（与 HTTP 状态码一致）
pub mod errno {
    pub const BAD_REQUEST: i32 = 400;
    pub const PAYLOAD_TOO_LARGE: i32 = 413;
    pub const TOO_MANY_REQUESTS: i32 = 429;
    pub const INTERNAL_ERROR: i32 = 500;
    pub const BAD_GATEWAY: i32 = 502;
    pub const SERVICE_UNAVAILABLE: i32 = 503;
    pub const GATEWAY_TIMEOUT: i32 = 504;
}

/// API 错误
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    PayloadTooLarge(String),
    TooManyRequests(String),
    Internal(String),
    BadGateway(String),
    ServiceUnavailable(String),
    GatewayTimeout(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let response = match &self {
            ApiError::BadRequest(msg) => {
                tracing::warn!(errno = errno::BAD_REQUEST, error = %msg, "Bad request");
                ErrorResponse::new(errno::BAD_REQUEST, msg.clone())
            }
            ApiError::PayloadTooLarge(msg) => {
                tracing::warn!(errno = errno::PAYLOAD_TOO_LARGE, error = %msg, "Request body too large");
                ErrorResponse::new(errno::PAYLOAD_TOO_LARGE, msg.clone())
            }
            ApiError::TooManyRequests(msg) => {
                tracing::warn!(errno = errno::TOO_MANY_REQUESTS, error = %msg, "Rate limited by backend");
                ErrorResponse::new(errno::TOO_MANY_REQUESTS, msg.clone())
            }
            ApiError::Internal(msg) => {
                tracing::error!(errno = errno::INTERNAL_ERROR, error = %msg, "Internal server error");
                ErrorResponse::new(errno::INTERNAL_ERROR, msg.clone())
            }
            ApiError::BadGateway(msg) => {
                tracing::error!(errno = errno::BAD_GATEWAY, error = %msg, "Backend synthesis failed");
                ErrorResponse::new(errno::BAD_GATEWAY, msg.clone())
            }
            ApiError::ServiceUnavailable(msg) => {
                tracing::error!(errno = errno::SERVICE_UNAVAILABLE, error = %msg, "Service unavailable");
                ErrorResponse::new(errno::SERVICE_UNAVAILABLE, msg.clone())
            }
            ApiError::GatewayTimeout(msg) => {
                tracing::error!(errno = errno::GATEWAY_TIMEOUT, error = %msg, "Synthesis timed out");
                ErrorResponse::new(errno::GATEWAY_TIMEOUT, msg.clone())
            }
        };

        (status, Json(response)).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        let msg = e.to_string();
        match e {
            PipelineError::InvalidInput(_) => ApiError::BadRequest(msg),
            PipelineError::BackendUnavailable { .. } | PipelineError::Cancelled => {
                ApiError::ServiceUnavailable(msg)
            }
            PipelineError::SynthesisFailed { .. } => ApiError::BadGateway(msg),
            PipelineError::RateLimited { .. } => ApiError::TooManyRequests(msg),
            PipelineError::Timeout { .. } | PipelineError::RunTimedOut { .. } => {
                ApiError::GatewayTimeout(msg)
            }
            PipelineError::FormatMismatch { .. }
            | PipelineError::NoAudioProduced
            | PipelineError::EncodingFailed(_)
            | PipelineError::IncompleteSynthesis { .. }
            | PipelineError::Storage(_)
            | PipelineError::InvalidState(_) => ApiError::Internal(msg),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(rejection.body_text())
        } else {
            ApiError::BadRequest(rejection.body_text())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{BackendIdentity, BackendKind};

    fn backend() -> BackendIdentity {
        BackendIdentity::new(BackendKind::Http, "gtts")
    }

    #[test]
    fn test_pipeline_error_status_mapping() {
        let cases = [
            (PipelineError::InvalidInput("empty".into()), StatusCode::BAD_REQUEST),
            (
                PipelineError::BackendUnavailable {
                    backend: backend(),
                    reason: "no key".into(),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                PipelineError::SynthesisFailed {
                    segment_index: 1,
                    backend: backend(),
                    reason: "HTTP 500".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                PipelineError::RateLimited {
                    segment_index: 0,
                    backend: backend(),
                },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                PipelineError::Timeout {
                    segment_index: 0,
                    backend: backend(),
                },
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                PipelineError::RunTimedOut { timeout_secs: 600 },
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (PipelineError::Cancelled, StatusCode::SERVICE_UNAVAILABLE),
            (PipelineError::NoAudioProduced, StatusCode::INTERNAL_SERVER_ERROR),
            (
                PipelineError::IncompleteSynthesis { missing: vec![2] },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[tokio::test]
    async fn test_error_body() {
        let response = ApiError::BadGateway("Synthesis of segment 1 failed".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["errno"], 502);
        assert_eq!(json["error"], "Synthesis of segment 1 failed");
        assert!(json["data"].is_null());
    }
}
