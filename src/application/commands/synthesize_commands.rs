//! Synthesize Commands - 合成相关命令

use std::time::Duration;
use uuid::Uuid;

use crate::application::ports::{EncodeConfig, EncodedAudio};
use crate::application::retry::RetryPolicy;
use crate::domain::{AssemblerConfig, SegmentConfig};

/// 文本转语音命令
#[derive(Debug, Clone)]
pub struct SynthesizeSpeechCommand {
    pub text: String,
}

/// 文本转语音响应
#[derive(Debug, Clone)]
pub struct SynthesizeSpeechResponse {
    pub run_id: Uuid,
    pub segment_count: usize,
    pub audio: EncodedAudio,
}

/// 流水线配置
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// 分段配置
    pub segment: SegmentConfig,
    /// 单次运行内的最大并发合成数
    pub worker_concurrency: usize,
    /// 单段合成超时
    pub per_segment_timeout: Duration,
    /// 整个运行的超时
    pub run_timeout: Duration,
    /// 重试策略
    pub retry: RetryPolicy,
    /// 拼接配置
    pub assembler: AssemblerConfig,
    /// 编码配置
    pub encode: EncodeConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            segment: SegmentConfig::default(),
            worker_concurrency: 2,
            per_segment_timeout: Duration::from_secs(120),
            run_timeout: Duration::from_secs(600),
            retry: RetryPolicy::default(),
            assembler: AssemblerConfig::default(),
            encode: EncodeConfig::default(),
        }
    }
}
