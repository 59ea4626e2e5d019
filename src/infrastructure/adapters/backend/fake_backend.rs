//! Fake Synthesis Backend - 用于开发和测试的后端
//!
//! 不调用任何 TTS 服务，为每个片段生成一段正弦波 WAV，时长与字符数成正比

use async_trait::async_trait;
use std::time::Duration;

use crate::application::ports::{BackendError, BackendIdentity, BackendKind, SynthesisBackend};
use crate::domain::{AudioClip, ClipFormat, Segment};
use crate::infrastructure::adapters::codec::wav;

/// Fake 后端配置
#[derive(Debug, Clone)]
pub struct FakeBackendConfig {
    /// 采样率
    pub sample_rate: u32,
    /// 每个字符对应的时长（毫秒）
    pub ms_per_char: u32,
    /// 模拟推理延迟（毫秒）
    pub latency_ms: u64,
}

impl Default for FakeBackendConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22050,
            ms_per_char: 60,
            latency_ms: 0,
        }
    }
}

/// Fake 合成后端
pub struct FakeSynthesisBackend {
    config: FakeBackendConfig,
}

impl FakeSynthesisBackend {
    pub fn new(config: FakeBackendConfig) -> Self {
        tracing::info!(
            sample_rate = config.sample_rate,
            ms_per_char = config.ms_per_char,
            "FakeSynthesisBackend initialized"
        );
        Self { config }
    }

    /// 片段对应的帧数，至少一帧
    fn frames_for(&self, text: &str) -> usize {
        let ms = text.chars().count() as u64 * self.config.ms_per_char as u64;
        ((ms * self.config.sample_rate as u64 / 1000) as usize).max(1)
    }
}

impl Default for FakeSynthesisBackend {
    fn default() -> Self {
        Self::new(FakeBackendConfig::default())
    }
}

#[async_trait]
impl SynthesisBackend for FakeSynthesisBackend {
    fn identity(&self) -> BackendIdentity {
        BackendIdentity::new(BackendKind::Fake, "sine")
    }

    async fn load(&self) -> Result<(), BackendError> {
        if self.config.sample_rate == 0 {
            return Err(BackendError::Unavailable("sample rate must be positive".to_string()));
        }
        Ok(())
    }

    async fn synthesize(&self, segment: &Segment) -> Result<AudioClip, BackendError> {
        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }

        let rate = self.config.sample_rate as f32;
        // 每个片段音高不同，便于试听时分辨顺序
        let freq = 220.0 + 55.0 * (segment.index % 8) as f32;
        let samples: Vec<f32> = (0..self.frames_for(&segment.text))
            .map(|i| (i as f32 * freq * 2.0 * std::f32::consts::PI / rate).sin() * 0.3)
            .collect();

        let data = wav::encode_pcm16(&samples, self.config.sample_rate, 1)
            .map_err(|e| BackendError::SynthesisFailed(e.to_string()))?;

        tracing::debug!(
            segment_index = segment.index,
            frames = samples.len(),
            "FakeSynthesisBackend: generated tone"
        );

        Ok(AudioClip::new(segment.index, data, ClipFormat::Wav))
    }
}
