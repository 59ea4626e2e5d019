//! Parlo - 分段并发的文本转语音服务
//!
//! 架构设计: DDD + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - 文本分段、音频片段与拼接、运行状态机
//!
//! 应用层 (application/):
//! - Ports: 端口定义（SynthesisBackend, AudioCodec, ScratchSpace）
//! - Commands: 合成流水线编排
//! - Queries: 后端状态查询
//!
//! 基础设施层 (infrastructure/):
//! - HTTP: /tts 与 /health
//! - Adapters: HTTP / Piper / Fake 后端，symphonia + opus 编解码，临时目录

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
