//! Audio Codec Port - 音频编解码抽象
//!
//! 后端片段解码为 PCM，拼接后的音轨编码为交付格式（WAV、Opus）

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{AssembledTrack, AudioClip, DecodedClip};

/// 编解码错误
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Decoding error: {0}")]
    DecodingError(String),
}

/// 交付格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// 16 位 PCM WAV
    Wav,
    /// Opus（OGG 容器）
    #[default]
    Opus,
}

impl OutputFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Wav => "audio/wav",
            OutputFormat::Opus => "audio/ogg",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Wav => "wav",
            OutputFormat::Opus => "ogg",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Wav => write!(f, "wav"),
            OutputFormat::Opus => write!(f, "opus"),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "wav" => Ok(OutputFormat::Wav),
            "opus" | "ogg" => Ok(OutputFormat::Opus),
            _ => Err(CodecError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// 编码配置
#[derive(Debug, Clone)]
pub struct EncodeConfig {
    /// 输出格式
    pub format: OutputFormat,
    /// 目标比特率（bps），仅用于有损格式
    /// Opus 推荐: 16000-64000 用于语音
    pub bitrate: u32,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Opus,
            bitrate: 32000, // 32kbps，语音足够
        }
    }
}

/// 编码结果
#[derive(Debug, Clone)]
pub struct EncodedAudio {
    pub data: Vec<u8>,
    pub format: OutputFormat,
    /// 时长（毫秒）
    pub duration_ms: u64,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Audio Codec Port
#[async_trait]
pub trait AudioCodecPort: Send + Sync {
    /// 解码后端片段
    ///
    /// 任何一部分无法解码都返回错误，不得静默丢弃音频
    async fn decode(&self, clip: &AudioClip) -> Result<DecodedClip, CodecError>;

    /// 编码拼接后的音轨
    async fn encode(
        &self,
        track: AssembledTrack,
        config: &EncodeConfig,
    ) -> Result<EncodedAudio, CodecError>;

    /// 检查是否支持指定格式
    fn supports_format(&self, format: OutputFormat) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parse() {
        assert_eq!("WAV".parse::<OutputFormat>().unwrap(), OutputFormat::Wav);
        assert_eq!("ogg".parse::<OutputFormat>().unwrap(), OutputFormat::Opus);
        assert!("mp3".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_content_type() {
        assert_eq!(OutputFormat::Opus.content_type(), "audio/ogg");
        assert_eq!(OutputFormat::Wav.extension(), "wav");
    }
}
