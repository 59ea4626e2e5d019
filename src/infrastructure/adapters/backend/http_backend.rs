//! HTTP Synthesis Backend - 调用外部 TTS HTTP 服务
//!
//! 实现 SynthesisBackend trait，每个片段一次 HTTP 请求
//!
//! 外部 TTS API:
//! POST {url}
//! Request: {"text": "...", "language": "en"}  (JSON，可选 Bearer 凭据)
//! Response: 音频字节；容器格式由 Content-Type 给出，缺失时按文件头识别

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;

use crate::application::ports::{BackendError, BackendIdentity, BackendKind, SynthesisBackend};
use crate::domain::{AudioClip, ClipFormat, Segment};

/// TTS 合成请求体 (JSON)
#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<&'a str>,
}

/// HTTP 后端配置
#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    /// 合成接口完整 URL
    pub url: String,
    /// Bearer 凭据
    pub api_key: Option<String>,
    /// 没有凭据时拒绝启动
    pub require_api_key: bool,
    /// 语言代码
    pub language: Option<String>,
    /// 服务商名称（用于日志和状态），缺省取 URL 主机名
    pub provider: Option<String>,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
    /// 健康检查 URL
    pub health_url: Option<String>,
}

impl Default for HttpBackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000/api/tts".to_string(),
            api_key: None,
            require_api_key: false,
            language: Some("en".to_string()),
            provider: None,
            timeout_secs: 120,
            health_url: None,
        }
    }
}

impl HttpBackendConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

/// HTTP 合成后端
pub struct HttpSynthesisBackend {
    client: Client,
    config: HttpBackendConfig,
    name: String,
}

impl HttpSynthesisBackend {
    pub fn new(config: HttpBackendConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;

        let name = config.provider.clone().unwrap_or_else(|| {
            reqwest::Url::parse(&config.url)
                .ok()
                .and_then(|url| url.host_str().map(str::to_string))
                .unwrap_or_else(|| config.url.clone())
        });

        Ok(Self {
            client,
            config,
            name,
        })
    }

    fn api_key(&self) -> Option<&str> {
        self.config
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
    }

    fn check_credentials(&self) -> Result<(), BackendError> {
        if self.config.require_api_key && self.api_key().is_none() {
            return Err(BackendError::Unavailable(
                "API key is required but not configured".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl SynthesisBackend for HttpSynthesisBackend {
    fn identity(&self) -> BackendIdentity {
        BackendIdentity::new(BackendKind::Http, self.name.clone())
    }

    async fn load(&self) -> Result<(), BackendError> {
        reqwest::Url::parse(&self.config.url)
            .map_err(|e| BackendError::Unavailable(format!("invalid url {}: {}", self.config.url, e)))?;
        self.check_credentials()
    }

    async fn synthesize(&self, segment: &Segment) -> Result<AudioClip, BackendError> {
        let body = SynthesisRequest {
            text: &segment.text,
            language: self.config.language.as_deref(),
        };

        tracing::debug!(
            url = %self.config.url,
            segment_index = segment.index,
            text_len = segment.text.len(),
            "Sending TTS request"
        );

        let mut request = self.client.post(&self.config.url).json(&body);
        if let Some(key) = self.api_key() {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout
            } else if e.is_connect() {
                BackendError::SynthesisFailed(format!("Cannot connect to TTS service: {}", e))
            } else {
                BackendError::SynthesisFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let error_text = response.text().await.unwrap_or_default();
            return Err(map_status(status, retry_after, &error_text));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut data = response
            .bytes()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Timeout
                } else {
                    BackendError::SynthesisFailed(format!("Failed to read audio: {}", e))
                }
            })?
            .to_vec();

        if data.is_empty() {
            return Err(BackendError::SynthesisFailed("empty audio response".to_string()));
        }

        let format = detect_format(content_type.as_deref(), &data).ok_or_else(|| {
            BackendError::SynthesisFailed(format!(
                "unrecognized audio (content-type {})",
                content_type.as_deref().unwrap_or("none")
            ))
        })?;

        if let ClipFormat::Pcm16 { .. } = format {
            // audio/L16 为大端序
            for pair in data.chunks_exact_mut(2) {
                pair.swap(0, 1);
            }
        }

        tracing::debug!(
            segment_index = segment.index,
            format = %format,
            audio_size = data.len(),
            "TTS request completed"
        );

        Ok(AudioClip::new(segment.index, data, format))
    }

    async fn health_check(&self) -> bool {
        let Some(url) = &self.config.health_url else {
            return self.check_credentials().is_ok();
        };
        match self
            .client
            .get(url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

/// 把非 2xx 响应映射为后端错误
fn map_status(status: StatusCode, retry_after: Option<Duration>, body: &str) -> BackendError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => BackendError::RateLimited { retry_after },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            BackendError::Unavailable(format!("HTTP {}: {}", status, body))
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => BackendError::Timeout,
        _ => BackendError::SynthesisFailed(format!("HTTP {}: {}", status, body)),
    }
}

/// 识别音频容器：先看 Content-Type，再看文件头
fn detect_format(content_type: Option<&str>, data: &[u8]) -> Option<ClipFormat> {
    if let Some(content_type) = content_type {
        let mut parts = content_type.split(';').map(str::trim);
        let mime = parts.next().unwrap_or_default().to_ascii_lowercase();
        match mime.as_str() {
            "audio/mpeg" | "audio/mp3" => return Some(ClipFormat::Mp3),
            "audio/wav" | "audio/wave" | "audio/x-wav" | "audio/vnd.wave" => {
                return Some(ClipFormat::Wav)
            }
            "audio/l16" => {
                let mut sample_rate = None;
                let mut channels = 1u16;
                for param in parts {
                    let Some((key, value)) = param.split_once('=') else {
                        continue;
                    };
                    match key.trim().to_ascii_lowercase().as_str() {
                        "rate" => sample_rate = value.trim().parse().ok(),
                        "channels" => channels = value.trim().parse().unwrap_or(1),
                        _ => {}
                    }
                }
                return sample_rate.map(|sample_rate| ClipFormat::Pcm16 {
                    sample_rate,
                    channels,
                });
            }
            _ => {}
        }
    }

    if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WAVE" {
        return Some(ClipFormat::Wav);
    }
    if data.starts_with(b"ID3") || (data.len() >= 2 && data[0] == 0xFF && data[1] & 0xE0 == 0xE0) {
        return Some(ClipFormat::Mp3);
    }
    None
}
