//! HTTP Middleware
//!
//! 请求耗时与错误状态码日志

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

/// 请求日志中间件
///
/// 4xx 记 warn，5xx 记 error，其余记 debug。
/// 错误原因在 ApiError::into_response() 中记录
pub async fn error_logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let started = Instant::now();

    let response = next.run(request).await;
    let status = response.status();
    let latency_ms = started.elapsed().as_millis() as u64;

    if status.is_server_error() {
        tracing::error!(
            method = %method,
            uri = %uri,
            status = status.as_u16(),
            latency_ms,
            "HTTP server error"
        );
    } else if status.is_client_error() {
        tracing::warn!(
            method = %method,
            uri = %uri,
            status = status.as_u16(),
            latency_ms,
            "HTTP client error"
        );
    } else {
        tracing::debug!(
            method = %method,
            uri = %uri,
            status = status.as_u16(),
            latency_ms,
            "HTTP request completed"
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        routing::{get, post},
        Router,
    };
    use tower::util::ServiceExt;

    fn router() -> Router {
        Router::new()
            .route("/health", get(|| async { "ok" }))
            .route("/tts", post(|| async { StatusCode::BAD_GATEWAY }))
            .layer(axum::middleware::from_fn(error_logging_middleware))
    }

    async fn status_of(method: &str, uri: &str) -> StatusCode {
        let request = HttpRequest::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        router().oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_passes_responses_through() {
        assert_eq!(status_of("GET", "/health").await, StatusCode::OK);
        assert_eq!(status_of("POST", "/tts").await, StatusCode::BAD_GATEWAY);
        assert_eq!(status_of("GET", "/missing").await, StatusCode::NOT_FOUND);
        assert_eq!(status_of("GET", "/tts").await, StatusCode::METHOD_NOT_ALLOWED);
    }
}
