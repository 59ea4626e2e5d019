//! 音频拼接器
//!
//! 把按序号排列的解码片段首尾相接成一条音轨。
//! 不做交叉淡化；只有配置了 `gap_ms` 才在片段之间插入静音。

use thiserror::Error;

use super::audio::{remix, resample, AssembledTrack, DecodedClip};

/// 拼接错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblyError {
    #[error("no audio produced")]
    NoAudioProduced,

    #[error("clip {segment_index} is out of order (previous index {previous})")]
    OutOfOrder {
        segment_index: usize,
        previous: usize,
    },

    #[error(
        "clip {segment_index} is {found_rate}Hz/{found_channels}ch, expected {expected_rate}Hz/{expected_channels}ch"
    )]
    FormatMismatch {
        segment_index: usize,
        expected_rate: u32,
        expected_channels: u16,
        found_rate: u32,
        found_channels: u16,
    },
}

/// 拼接配置
#[derive(Debug, Clone, Default)]
pub struct AssemblerConfig {
    /// 统一采样率；None 表示不转换，要求输入一致
    pub target_sample_rate: Option<u32>,
    /// 统一声道数；None 表示不转换，要求输入一致
    pub target_channels: Option<u16>,
    /// 片段之间插入的静音（毫秒）
    pub gap_ms: u32,
}

/// 音频拼接器
#[derive(Debug, Clone, Default)]
pub struct Assembler {
    config: AssemblerConfig,
}

impl Assembler {
    pub fn new(config: AssemblerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    /// 把片段统一到目标格式
    fn normalize(&self, clip: DecodedClip) -> DecodedClip {
        let mut clip = clip;
        if let Some(channels) = self.config.target_channels {
            if channels != clip.channels {
                clip.samples = remix(&clip.samples, clip.channels, channels);
                clip.channels = channels;
            }
        }
        if let Some(rate) = self.config.target_sample_rate {
            if rate != clip.sample_rate {
                clip.samples = resample(&clip.samples, clip.sample_rate, rate, clip.channels);
                clip.sample_rate = rate;
            }
        }
        clip
    }

    /// 片段间静音的帧数
    fn gap_frames(&self, sample_rate: u32) -> usize {
        (sample_rate as u64 * self.config.gap_ms as u64 / 1000) as usize
    }

    /// 拼接片段
    ///
    /// `clips` 必须按序号严格递增；格式不一致且未配置统一目标时返回 `FormatMismatch`。
    pub fn assemble(&self, clips: Vec<DecodedClip>) -> Result<AssembledTrack, AssemblyError> {
        if clips.is_empty() {
            return Err(AssemblyError::NoAudioProduced);
        }

        let mut previous: Option<usize> = None;
        for clip in &clips {
            if let Some(prev) = previous {
                if clip.segment_index <= prev {
                    return Err(AssemblyError::OutOfOrder {
                        segment_index: clip.segment_index,
                        previous: prev,
                    });
                }
            }
            previous = Some(clip.segment_index);
        }

        let clips: Vec<DecodedClip> = clips.into_iter().map(|c| self.normalize(c)).collect();

        let sample_rate = clips[0].sample_rate;
        let channels = clips[0].channels;
        for clip in &clips[1..] {
            if clip.sample_rate != sample_rate || clip.channels != channels {
                return Err(AssemblyError::FormatMismatch {
                    segment_index: clip.segment_index,
                    expected_rate: sample_rate,
                    expected_channels: channels,
                    found_rate: clip.sample_rate,
                    found_channels: clip.channels,
                });
            }
        }

        let gap_samples = self.gap_frames(sample_rate) * channels as usize;
        let total: usize = clips.iter().map(|c| c.samples.len()).sum::<usize>()
            + gap_samples * (clips.len() - 1);
        let segment_count = clips.len();

        let mut samples = Vec::with_capacity(total);
        for (i, clip) in clips.into_iter().enumerate() {
            if i > 0 && gap_samples > 0 {
                samples.resize(samples.len() + gap_samples, 0.0);
            }
            samples.extend(clip.samples);
        }

        tracing::debug!(
            segment_count,
            frames = samples.len() / channels.max(1) as usize,
            sample_rate,
            channels,
            "Clips assembled"
        );

        Ok(AssembledTrack {
            samples,
            sample_rate,
            channels,
            segment_count,
        })
    }
}
