//! TTS Handler

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use std::sync::Arc;

use crate::application::SynthesizeSpeechCommand;
use crate::infrastructure::http::dto::TtsRequest;
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

pub const SEGMENT_COUNT_HEADER: &str = "x-segment-count";
pub const DURATION_MS_HEADER: &str = "x-duration-ms";
pub const RUN_ID_HEADER: &str = "x-run-id";

/// 文本转语音，返回完整音频文件
pub async fn synthesize(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TtsRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload?;

    // 服务关闭时取消进行中的运行
    let cancel = state.shutdown.child_token();
    let result = state
        .synthesize_handler
        .handle(SynthesizeSpeechCommand { text: req.text }, cancel)
        .await?;

    let audio = result.audio;
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, audio.format.content_type())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"speech.{}\"", audio.format.extension()),
        )
        .header(header::CONTENT_LENGTH, audio.data.len())
        .header(SEGMENT_COUNT_HEADER, result.segment_count)
        .header(DURATION_MS_HEADER, audio.duration_ms)
        .header(RUN_ID_HEADER, result.run_id.to_string())
        .body(Body::from(audio.data))
        .map_err(|e| ApiError::Internal(e.to_string()))
}
