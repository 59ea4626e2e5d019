//! Synthesis Backend Port - 语音合成后端抽象
//!
//! 定义逐段合成的抽象接口，具体实现在 infrastructure/adapters/backend 层

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::domain::{AudioClip, Segment};

/// 后端错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// 模型加载失败或凭据缺失，整个服务不可用
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// 单段合成失败
    #[error("Synthesis failed: {0}")]
    SynthesisFailed(String),

    /// 被限流
    #[error("Rate limited")]
    RateLimited { retry_after: Option<Duration> },

    /// 请求超时
    #[error("Request timeout")]
    Timeout,
}

impl BackendError {
    /// 是否可以按重试策略重试
    pub fn is_retryable(&self) -> bool {
        !matches!(self, BackendError::Unavailable(_))
    }
}

/// 后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// 外部 HTTP TTS 服务
    #[default]
    Http,
    /// 本地 Piper 模型
    Piper,
    /// 生成测试音的假后端
    Fake,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Http => "http",
            BackendKind::Piper => "piper",
            BackendKind::Fake => "fake",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 后端身份（出错时用于定位是哪个后端/模型）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendIdentity {
    pub kind: BackendKind,
    /// 服务商名或模型名
    pub name: String,
}

impl BackendIdentity {
    pub fn new(kind: BackendKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for BackendIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

/// Synthesis Backend Port
///
/// 把一个文本片段合成为一个音频片段
#[async_trait]
pub trait SynthesisBackend: Send + Sync {
    /// 后端身份
    fn identity(&self) -> BackendIdentity;

    /// 启动时加载（检查凭据、读取模型配置等）
    async fn load(&self) -> Result<(), BackendError> {
        Ok(())
    }

    /// 合成单个片段
    ///
    /// 超时由调用方控制；实现不得在并发调用之间共享可变状态
    async fn synthesize(&self, segment: &Segment) -> Result<AudioClip, BackendError>;

    /// 检查后端当前是否可用
    async fn health_check(&self) -> bool {
        true // 默认实现
    }

    /// 是否可重入；返回 false 时调用方会串行化所有调用
    fn is_reentrant(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_is_not_retryable() {
        assert!(!BackendError::Unavailable("no key".into()).is_retryable());
        assert!(BackendError::Timeout.is_retryable());
        assert!(BackendError::RateLimited { retry_after: None }.is_retryable());
        assert!(BackendError::SynthesisFailed("boom".into()).is_retryable());
    }

    #[test]
    fn test_identity_display() {
        let id = BackendIdentity::new(BackendKind::Piper, "en_US-amy-medium");
        assert_eq!(id.to_string(), "piper:en_US-amy-medium");
    }
}
