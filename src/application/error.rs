//! 应用层错误定义
//!
//! 合成流水线的统一错误分类，带上片段序号和后端身份以便诊断

use thiserror::Error;

use crate::application::ports::{BackendError, BackendIdentity, CodecError, ScratchError};
use crate::domain::{AssemblyError, RunError, SegmentError};

/// 流水线错误
#[derive(Debug, Error)]
pub enum PipelineError {
    /// 请求无效（不可重试）
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// 后端不可用（服务级）
    #[error("Backend {backend} unavailable: {reason}")]
    BackendUnavailable {
        backend: BackendIdentity,
        reason: String,
    },

    /// 单段合成失败
    #[error("Synthesis of segment {segment_index} failed on {backend}: {reason}")]
    SynthesisFailed {
        segment_index: usize,
        backend: BackendIdentity,
        reason: String,
    },

    /// 单段被限流
    #[error("Segment {segment_index} rate limited by {backend}")]
    RateLimited {
        segment_index: usize,
        backend: BackendIdentity,
    },

    /// 单段超时
    #[error("Segment {segment_index} timed out on {backend}")]
    Timeout {
        segment_index: usize,
        backend: BackendIdentity,
    },

    /// 整个运行超时
    #[error("Run timed out after {timeout_secs}s")]
    RunTimedOut { timeout_secs: u64 },

    /// 运行被取消
    #[error("Run cancelled")]
    Cancelled,

    /// 片段格式不一致或无法解码
    #[error("Format mismatch at segment {segment_index}: {detail}")]
    FormatMismatch { segment_index: usize, detail: String },

    /// 没有产生任何音频
    #[error("No audio produced")]
    NoAudioProduced,

    /// 编码失败
    #[error("Encoding failed: {0}")]
    EncodingFailed(String),

    /// 合成结果缺失（内部不变量被破坏）
    #[error("Incomplete synthesis, missing segments {missing:?}")]
    IncompleteSynthesis { missing: Vec<usize> },

    /// 临时存储错误
    #[error("Storage error: {0}")]
    Storage(String),

    /// 状态无效
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl PipelineError {
    /// 把后端错误映射为流水线错误
    pub fn from_backend(err: BackendError, segment_index: usize, backend: BackendIdentity) -> Self {
        match err {
            BackendError::Unavailable(reason) => Self::BackendUnavailable { backend, reason },
            BackendError::SynthesisFailed(reason) => Self::SynthesisFailed {
                segment_index,
                backend,
                reason,
            },
            BackendError::RateLimited { .. } => Self::RateLimited {
                segment_index,
                backend,
            },
            BackendError::Timeout => Self::Timeout {
                segment_index,
                backend,
            },
        }
    }

    /// 出错的片段序号（如果有）
    pub fn segment_index(&self) -> Option<usize> {
        match self {
            Self::SynthesisFailed { segment_index, .. }
            | Self::RateLimited { segment_index, .. }
            | Self::Timeout { segment_index, .. }
            | Self::FormatMismatch { segment_index, .. } => Some(*segment_index),
            _ => None,
        }
    }

    /// 简短的错误类别，用于日志和运行状态
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::BackendUnavailable { .. } => "backend_unavailable",
            Self::SynthesisFailed { .. } => "synthesis_failed",
            Self::RateLimited { .. } => "rate_limited",
            Self::Timeout { .. } => "timeout",
            Self::RunTimedOut { .. } => "run_timed_out",
            Self::Cancelled => "cancelled",
            Self::FormatMismatch { .. } => "format_mismatch",
            Self::NoAudioProduced => "no_audio_produced",
            Self::EncodingFailed(_) => "encoding_failed",
            Self::IncompleteSynthesis { .. } => "incomplete_synthesis",
            Self::Storage(_) => "storage",
            Self::InvalidState(_) => "invalid_state",
        }
    }
}

impl From<SegmentError> for PipelineError {
    fn from(err: SegmentError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

impl From<AssemblyError> for PipelineError {
    fn from(err: AssemblyError) -> Self {
        match err {
            AssemblyError::NoAudioProduced => Self::NoAudioProduced,
            AssemblyError::OutOfOrder { segment_index, .. } => Self::FormatMismatch {
                segment_index,
                detail: err.to_string(),
            },
            AssemblyError::FormatMismatch { segment_index, .. } => Self::FormatMismatch {
                segment_index,
                detail: err.to_string(),
            },
        }
    }
}

impl From<CodecError> for PipelineError {
    fn from(err: CodecError) -> Self {
        Self::EncodingFailed(err.to_string())
    }
}

impl From<ScratchError> for PipelineError {
    fn from(err: ScratchError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<RunError> for PipelineError {
    fn from(err: RunError) -> Self {
        Self::InvalidState(err.to_string())
    }
}
