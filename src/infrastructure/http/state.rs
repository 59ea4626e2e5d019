//! Application State
//!
//! HTTP 层共享的 Command/Query Handlers

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::application::{
    AudioCodecPort, BackendReadiness, GetBackendStatusHandler, PipelineConfig, ScratchSpacePort,
    SynthesisBackend, SynthesizeSpeechHandler,
};

/// 应用状态
pub struct AppState {
    pub synthesize_handler: SynthesizeSpeechHandler,
    pub backend_status_handler: GetBackendStatusHandler,
    /// 服务关闭时取消，所有运行的取消令牌都派生自它
    pub shutdown: CancellationToken,
}

impl AppState {
    /// 创建应用状态
    pub fn new(
        backend: Arc<dyn SynthesisBackend>,
        codec: Arc<dyn AudioCodecPort>,
        scratch_space: Arc<dyn ScratchSpacePort>,
        readiness: Arc<BackendReadiness>,
        config: PipelineConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let output_format = config.encode.format;
        Self {
            backend_status_handler: GetBackendStatusHandler::new(
                backend.clone(),
                readiness.clone(),
                output_format,
            ),
            synthesize_handler: SynthesizeSpeechHandler::new(
                backend,
                codec,
                scratch_space,
                readiness,
                config,
            ),
            shutdown,
        }
    }
}
