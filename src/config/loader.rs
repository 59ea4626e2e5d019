//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::{AppConfig, BackendKindConfig};
use crate::application::ports::OutputFormat;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// Opus 可接受的比特率范围（bps）
const OPUS_BITRATE_RANGE: std::ops::RangeInclusive<u32> = 6_000..=510_000;

/// 加载应用配置
///
/// # 环境变量示例
/// - `PARLO_SERVER__PORT=8080`
/// - `PARLO_BACKEND__KIND=piper`
/// - `PARLO_BACKEND__HTTP__API_KEY=...`
/// - `PARLO_PIPELINE__MAX_SEGMENT_LENGTH=300`
///
/// 另外读取 `PORT` 作为端口默认值
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 默认值（最低优先级）；其余字段由 serde default 补齐
    builder = builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 5000)?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    if let Some(port) = port_from_env(std::env::var("PORT").ok()) {
        builder = builder.set_default("server.port", port)?;
    }

    // 2. 配置文件
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 环境变量（最高优先级），层级分隔符为双下划线
    builder = builder.add_source(
        Environment::with_prefix("PARLO")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// 解析 `PORT` 环境变量，无效值忽略
fn port_from_env(value: Option<String>) -> Option<i64> {
    let port: u16 = value?.trim().parse().ok()?;
    (port > 0).then_some(port as i64)
}

/// 验证配置有效性
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    let invalid = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));

    if config.server.port == 0 {
        return invalid("Server port cannot be 0");
    }
    if config.server.max_body_bytes == 0 {
        return invalid("Request body limit cannot be 0");
    }

    let pipeline = &config.pipeline;
    if pipeline.max_segment_length == 0 {
        return invalid("Max segment length cannot be 0");
    }
    if pipeline.worker_concurrency == 0 {
        return invalid("Worker concurrency cannot be 0");
    }
    if pipeline.per_segment_timeout_secs == 0 || pipeline.run_timeout_secs == 0 {
        return invalid("Timeouts cannot be 0");
    }

    match config.backend.kind {
        BackendKindConfig::Http => {
            if config.backend.http.url.trim().is_empty() {
                return invalid("HTTP backend URL cannot be empty");
            }
            if config.backend.http.timeout_secs == 0 {
                return invalid("HTTP backend timeout cannot be 0");
            }
        }
        BackendKindConfig::Piper => {
            if config.backend.piper.model_path.is_none() {
                return invalid("Piper backend requires backend.piper.model_path");
            }
        }
        BackendKindConfig::Fake => {}
    }

    if config.audio.output_format == OutputFormat::Opus
        && !OPUS_BITRATE_RANGE.contains(&config.audio.bitrate)
    {
        return Err(ConfigError::ValidationError(format!(
            "Opus bitrate {} out of range {:?}",
            config.audio.bitrate, OPUS_BITRATE_RANGE
        )));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志），不输出凭据
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Server: {}", config.server.addr());
    tracing::info!("Max Body: {} bytes", config.server.max_body_bytes);
    tracing::info!("Backend: {:?}", config.backend.kind);
    match config.backend.kind {
        BackendKindConfig::Http => {
            let http = &config.backend.http;
            tracing::info!("TTS URL: {}", http.url);
            tracing::info!("TTS Timeout: {}s", http.timeout_secs);
            tracing::info!(
                "API Key: {}",
                if http.api_key.as_deref().is_some_and(|k| !k.is_empty()) {
                    "configured"
                } else {
                    "not set"
                }
            );
        }
        BackendKindConfig::Piper => {
            let piper = &config.backend.piper;
            tracing::info!("Piper Binary: {}", piper.binary.display());
            if let Some(model) = &piper.model_path {
                tracing::info!("Piper Model: {}", model.display());
            }
        }
        BackendKindConfig::Fake => {
            tracing::info!("Fake Sample Rate: {}", config.backend.fake.sample_rate);
        }
    }
    tracing::info!(
        "Segments: max {} {:?}, oversize {:?}",
        config.pipeline.max_segment_length,
        config.pipeline.length_unit,
        config.pipeline.oversize_policy
    );
    tracing::info!("Worker Concurrency: {}", config.pipeline.worker_concurrency);
    tracing::info!(
        "Timeouts: {}s per segment, {}s per run",
        config.pipeline.per_segment_timeout_secs,
        config.pipeline.run_timeout_secs
    );
    tracing::info!("Max Retries: {}", config.pipeline.max_retries);
    tracing::info!(
        "Output: {} @ {} bps",
        config.audio.output_format,
        config.audio.bitrate
    );
    tracing::info!("Scratch Directory: {:?}", config.storage.scratch_dir);
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_validation_passes_for_default_config() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_validation_errors() {
        let cases: Vec<fn(&mut AppConfig)> = vec![
            |c| c.server.port = 0,
            |c| c.pipeline.max_segment_length = 0,
            |c| c.pipeline.worker_concurrency = 0,
            |c| c.pipeline.per_segment_timeout_secs = 0,
            |c| c.pipeline.run_timeout_secs = 0,
            |c| c.backend.http.url = "  ".to_string(),
            |c| c.backend.kind = BackendKindConfig::Piper,
            |c| c.audio.bitrate = 1000,
        ];

        for mutate in cases {
            let mut config = AppConfig::default();
            mutate(&mut config);
            assert!(matches!(
                validate_config(&config),
                Err(ConfigError::ValidationError(_))
            ));
        }
    }

    #[test]
    fn test_wav_ignores_bitrate() {
        let mut config = AppConfig::default();
        config.audio.output_format = OutputFormat::Wav;
        config.audio.bitrate = 0;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_piper_with_model_is_valid() {
        let mut config = AppConfig::default();
        config.backend.kind = BackendKindConfig::Piper;
        config.backend.piper.model_path = Some(PathBuf::from("/models/voice.onnx"));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_port_from_env() {
        assert_eq!(port_from_env(Some("8080".to_string())), Some(8080));
        assert_eq!(port_from_env(Some(" 5001 ".to_string())), Some(5001));
        assert_eq!(port_from_env(Some("0".to_string())), None);
        assert_eq!(port_from_env(Some("http".to_string())), None);
        assert_eq!(port_from_env(None), None);
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("parlo.toml");
        std::fs::write(
            &path,
            r#"
[server]
port = 9000

[backend]
kind = "fake"

[backend.fake]
sample_rate = 16000

[pipeline]
max_segment_length = 120
oversize_policy = "split"
length_unit = "bytes"

[audio]
output_format = "wav"
gap_ms = 150
"#,
        )
        .unwrap();

        let config = load_config_from_path(Some(path.as_path())).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.backend.kind, BackendKindConfig::Fake);
        assert_eq!(config.backend.fake.sample_rate, 16000);
        assert_eq!(config.backend.fake.ms_per_char, 60);
        assert_eq!(config.pipeline.max_segment_length, 120);
        assert_eq!(
            config.pipeline.oversize_policy,
            crate::domain::OversizePolicy::Split
        );
        assert_eq!(config.pipeline.length_unit, crate::domain::LengthUnit::Bytes);
        assert_eq!(config.audio.output_format, OutputFormat::Wav);
        assert_eq!(config.audio.gap_ms, 150);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("parlo.toml");
        std::fs::write(&path, "[pipeline]\nworker_concurrency = 0\n").unwrap();

        assert!(matches!(
            load_config_from_path(Some(path.as_path())),
            Err(ConfigError::ValidationError(_))
        ));
    }
}
