//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（SynthesisBackend、AudioCodec、ScratchSpace）
//! - commands: 合成命令及流水线编排
//! - queries: 后端状态查询
//! - error: 应用层错误定义

pub mod commands;
pub mod error;
pub mod ports;
pub mod queries;
pub mod readiness;
pub mod retry;

// Re-exports
pub use commands::{
    handlers::SynthesizeSpeechHandler, PipelineConfig, SynthesizeSpeechCommand,
    SynthesizeSpeechResponse,
};

pub use error::PipelineError;

pub use ports::{
    // Audio codec
    AudioCodecPort,
    CodecError,
    EncodeConfig,
    EncodedAudio,
    OutputFormat,
    // Scratch space
    RunScratch,
    ScratchError,
    ScratchSpacePort,
    StoredClip,
    // Synthesis backend
    BackendError,
    BackendIdentity,
    BackendKind,
    SynthesisBackend,
};

pub use queries::{
    handlers::{BackendStatus, GetBackendStatusHandler},
    GetBackendStatus,
};

pub use readiness::{BackendReadiness, Readiness};
pub use retry::RetryPolicy;
