//! Configuration Types
//!
//! 定义所有配置结构体，以及到各组件运行配置的转换

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::application::ports::{EncodeConfig, OutputFormat};
use crate::application::{PipelineConfig, RetryPolicy};
use crate::domain::{AssemblerConfig, LengthUnit, OversizePolicy, SegmentConfig};
use crate::infrastructure::adapters::{FakeBackendConfig, HttpBackendConfig, PiperBackendConfig};

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,

    /// 合成后端配置
    #[serde(default)]
    pub backend: BackendConfig,

    /// 流水线配置
    #[serde(default)]
    pub pipeline: PipelineSection,

    /// 音频配置
    #[serde(default)]
    pub audio: AudioConfig,

    /// 存储配置
    #[serde(default)]
    pub storage: StorageConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

impl AppConfig {
    /// 组装流水线运行配置
    pub fn pipeline_config(&self) -> PipelineConfig {
        let p = &self.pipeline;
        PipelineConfig {
            segment: SegmentConfig {
                max_len: p.max_segment_length,
                unit: p.length_unit,
                oversize: p.oversize_policy,
            },
            worker_concurrency: p.worker_concurrency,
            per_segment_timeout: Duration::from_secs(p.per_segment_timeout_secs),
            run_timeout: Duration::from_secs(p.run_timeout_secs),
            retry: RetryPolicy {
                max_retries: p.max_retries,
                initial_backoff: Duration::from_millis(p.retry_backoff_ms),
                max_backoff: Duration::from_millis(p.retry_max_backoff_ms),
            },
            assembler: AssemblerConfig {
                target_sample_rate: (self.audio.sample_rate > 0).then_some(self.audio.sample_rate),
                target_channels: (self.audio.channels > 0).then_some(self.audio.channels),
                gap_ms: self.audio.gap_ms,
            },
            encode: EncodeConfig {
                format: self.audio.output_format,
                bitrate: self.audio.bitrate,
            },
        }
    }
}

// ============================================================================
// Server
// ============================================================================

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,

    /// 请求体上限（字节）
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ServerConfig {
    /// 获取服务器地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ============================================================================
// Backend
// ============================================================================

/// 后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKindConfig {
    #[default]
    Http,
    Piper,
    Fake,
}

/// 合成后端配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKindConfig,

    #[serde(default)]
    pub http: HttpSection,

    #[serde(default)]
    pub piper: PiperSection,

    #[serde(default)]
    pub fake: FakeSection,
}

/// HTTP TTS 服务配置
#[derive(Debug, Clone, Deserialize)]
pub struct HttpSection {
    /// 合成接口完整 URL
    #[serde(default = "default_http_url")]
    pub url: String,

    /// Bearer 凭据
    #[serde(default)]
    pub api_key: Option<String>,

    /// 没有凭据时视为不可用
    #[serde(default)]
    pub require_api_key: bool,

    /// 语言代码，置空则不发送
    #[serde(default = "default_language")]
    pub language: Option<String>,

    /// 服务商名称
    #[serde(default)]
    pub provider: Option<String>,

    /// 请求超时时间（秒）
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,

    /// 健康检查 URL
    #[serde(default)]
    pub health_url: Option<String>,
}

fn default_http_url() -> String {
    "http://localhost:8000/api/tts".to_string()
}

fn default_language() -> Option<String> {
    Some("en".to_string())
}

fn default_http_timeout() -> u64 {
    120
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            url: default_http_url(),
            api_key: None,
            require_api_key: false,
            language: default_language(),
            provider: None,
            timeout_secs: default_http_timeout(),
            health_url: None,
        }
    }
}

impl HttpSection {
    pub fn to_backend_config(&self) -> HttpBackendConfig {
        HttpBackendConfig {
            url: self.url.clone(),
            api_key: self.api_key.clone().filter(|k| !k.is_empty()),
            require_api_key: self.require_api_key,
            language: self.language.clone().filter(|l| !l.is_empty()),
            provider: self.provider.clone(),
            timeout_secs: self.timeout_secs,
            health_url: self.health_url.clone(),
        }
    }
}

/// Piper 本地模型配置
#[derive(Debug, Clone, Deserialize)]
pub struct PiperSection {
    #[serde(default = "default_piper_binary")]
    pub binary: PathBuf,

    /// `.onnx` 模型路径
    #[serde(default)]
    pub model_path: Option<PathBuf>,

    /// 一次只运行一个 piper 进程
    #[serde(default = "default_true")]
    pub serialize: bool,
}

fn default_piper_binary() -> PathBuf {
    PathBuf::from("piper")
}

fn default_true() -> bool {
    true
}

impl Default for PiperSection {
    fn default() -> Self {
        Self {
            binary: default_piper_binary(),
            model_path: None,
            serialize: true,
        }
    }
}

impl PiperSection {
    /// 未配置模型时返回 None
    pub fn to_backend_config(&self) -> Option<PiperBackendConfig> {
        let model_path = self.model_path.clone()?;
        Some(PiperBackendConfig {
            binary: self.binary.clone(),
            model_path,
            serialize: self.serialize,
        })
    }
}

/// Fake 后端配置
#[derive(Debug, Clone, Deserialize)]
pub struct FakeSection {
    #[serde(default = "default_fake_sample_rate")]
    pub sample_rate: u32,

    #[serde(default = "default_ms_per_char")]
    pub ms_per_char: u32,

    #[serde(default)]
    pub latency_ms: u64,
}

fn default_fake_sample_rate() -> u32 {
    22050
}

fn default_ms_per_char() -> u32 {
    60
}

impl Default for FakeSection {
    fn default() -> Self {
        Self {
            sample_rate: default_fake_sample_rate(),
            ms_per_char: default_ms_per_char(),
            latency_ms: 0,
        }
    }
}

impl FakeSection {
    pub fn to_backend_config(&self) -> FakeBackendConfig {
        FakeBackendConfig {
            sample_rate: self.sample_rate,
            ms_per_char: self.ms_per_char,
            latency_ms: self.latency_ms,
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// 流水线配置
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSection {
    /// 单个片段的最大长度
    #[serde(default = "default_max_segment_length")]
    pub max_segment_length: usize,

    #[serde(default)]
    pub length_unit: LengthUnit,

    #[serde(default)]
    pub oversize_policy: OversizePolicy,

    /// 单次运行内的最大并发合成数
    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,

    #[serde(default = "default_per_segment_timeout")]
    pub per_segment_timeout_secs: u64,

    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,

    /// 0 表示失败即终止
    #[serde(default)]
    pub max_retries: u32,

    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,

    #[serde(default = "default_retry_max_backoff")]
    pub retry_max_backoff_ms: u64,
}

fn default_max_segment_length() -> usize {
    crate::domain::DEFAULT_MAX_SEGMENT_LENGTH
}

fn default_worker_concurrency() -> usize {
    2
}

fn default_per_segment_timeout() -> u64 {
    120
}

fn default_run_timeout() -> u64 {
    600
}

fn default_retry_backoff() -> u64 {
    500
}

fn default_retry_max_backoff() -> u64 {
    8000
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            max_segment_length: default_max_segment_length(),
            length_unit: LengthUnit::default(),
            oversize_policy: OversizePolicy::default(),
            worker_concurrency: default_worker_concurrency(),
            per_segment_timeout_secs: default_per_segment_timeout(),
            run_timeout_secs: default_run_timeout(),
            max_retries: 0,
            retry_backoff_ms: default_retry_backoff(),
            retry_max_backoff_ms: default_retry_max_backoff(),
        }
    }
}

// ============================================================================
// Audio
// ============================================================================

/// 音频配置
#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// 交付格式
    #[serde(default)]
    pub output_format: OutputFormat,

    /// Opus 比特率（bps）
    #[serde(default = "default_bitrate")]
    pub bitrate: u32,

    /// 统一采样率，0 表示保持后端采样率
    #[serde(default)]
    pub sample_rate: u32,

    /// 统一声道数，0 表示保持
    #[serde(default = "default_channels")]
    pub channels: u16,

    /// 片段之间的静音（毫秒）
    #[serde(default)]
    pub gap_ms: u32,
}

fn default_bitrate() -> u32 {
    32000
}

fn default_channels() -> u16 {
    1
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::default(),
            bitrate: default_bitrate(),
            sample_rate: 0,
            channels: default_channels(),
            gap_ms: 0,
        }
    }
}

// ============================================================================
// Storage / Log
// ============================================================================

/// 存储配置
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// 每次运行的临时目录都建在这里
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("parlo")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            scratch_dir: default_scratch_dir(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否输出 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.max_body_bytes, 1024 * 1024);
        assert_eq!(config.backend.kind, BackendKindConfig::Http);
        assert_eq!(config.backend.http.language.as_deref(), Some("en"));
        assert!(config.backend.piper.serialize);
        assert_eq!(config.pipeline.max_segment_length, 200);
        assert_eq!(config.audio.output_format, OutputFormat::Opus);
        assert!(!config.log.json);
    }

    #[test]
    fn test_pipeline_config_conversion() {
        let mut config = AppConfig::default();
        config.pipeline.max_retries = 3;
        config.audio.sample_rate = 24000;
        config.audio.channels = 0;
        config.audio.output_format = OutputFormat::Wav;

        let pipeline = config.pipeline_config();
        assert_eq!(pipeline.segment.max_len, 200);
        assert_eq!(pipeline.worker_concurrency, 2);
        assert_eq!(pipeline.run_timeout, Duration::from_secs(600));
        assert_eq!(pipeline.retry.max_retries, 3);
        assert_eq!(pipeline.retry.initial_backoff, Duration::from_millis(500));
        assert_eq!(pipeline.assembler.target_sample_rate, Some(24000));
        assert_eq!(pipeline.assembler.target_channels, None);
        assert_eq!(pipeline.encode.format, OutputFormat::Wav);
        assert_eq!(pipeline.encode.bitrate, 32000);
    }

    #[test]
    fn test_http_section_drops_empty_values() {
        let section = HttpSection {
            api_key: Some(String::new()),
            language: Some(String::new()),
            ..Default::default()
        };
        let backend = section.to_backend_config();
        assert!(backend.api_key.is_none());
        assert!(backend.language.is_none());
    }

    #[test]
    fn test_piper_requires_model() {
        assert!(PiperSection::default().to_backend_config().is_none());

        let section = PiperSection {
            model_path: Some(PathBuf::from("/models/en_US-lessac-medium.onnx")),
            ..Default::default()
        };
        let backend = section.to_backend_config().unwrap();
        assert_eq!(backend.binary, PathBuf::from("piper"));
        assert!(backend.serialize);
    }
}
