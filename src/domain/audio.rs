//! Audio Value Objects - 音频值对象
//!
//! 后端输出的编码片段、解码后的 PCM 片段、拼接后的音轨，以及重采样/声道转换工具

use std::fmt;

/// 后端输出的音频容器格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipFormat {
    /// RIFF/WAVE
    Wav,
    /// MPEG Layer III
    Mp3,
    /// 裸 16 位小端 PCM（交错）
    Pcm16 { sample_rate: u32, channels: u16 },
}

impl ClipFormat {
    /// 文件扩展名
    pub fn extension(&self) -> &'static str {
        match self {
            ClipFormat::Wav => "wav",
            ClipFormat::Mp3 => "mp3",
            ClipFormat::Pcm16 { .. } => "pcm",
        }
    }
}

impl fmt::Display for ClipFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClipFormat::Wav => write!(f, "wav"),
            ClipFormat::Mp3 => write!(f, "mp3"),
            ClipFormat::Pcm16 {
                sample_rate,
                channels,
            } => write!(f, "pcm16({}Hz, {}ch)", sample_rate, channels),
        }
    }
}

/// 一次后端调用产出的音频片段（未解码）
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub segment_index: usize,
    pub data: Vec<u8>,
    pub format: ClipFormat,
}

impl AudioClip {
    pub fn new(segment_index: usize, data: Vec<u8>, format: ClipFormat) -> Self {
        Self {
            segment_index,
            data,
            format,
        }
    }
}

/// 解码后的 PCM 片段
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedClip {
    pub segment_index: usize,
    /// 交错的 f32 样本，范围 [-1.0, 1.0]
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl DecodedClip {
    /// 帧数（每声道样本数）
    pub fn frames(&self) -> usize {
        frame_count(self.samples.len(), self.channels)
    }

    pub fn duration_ms(&self) -> u64 {
        duration_ms(self.frames(), self.sample_rate)
    }
}

/// 按序拼接后的完整音轨
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledTrack {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
    /// 参与拼接的片段数
    pub segment_count: usize,
}

impl AssembledTrack {
    pub fn frames(&self) -> usize {
        frame_count(self.samples.len(), self.channels)
    }

    pub fn duration_ms(&self) -> u64 {
        duration_ms(self.frames(), self.sample_rate)
    }
}

fn frame_count(samples: usize, channels: u16) -> usize {
    if channels == 0 {
        0
    } else {
        samples / channels as usize
    }
}

fn duration_ms(frames: usize, sample_rate: u32) -> u64 {
    if sample_rate == 0 {
        0
    } else {
        (frames as u64 * 1000) / sample_rate as u64
    }
}

/// 简单线性重采样
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32, channels: u16) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || channels == 0 {
        return samples.to_vec();
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let channel_count = channels as usize;
    let frame_count = samples.len() / channel_count;
    let new_frame_count = (frame_count as f64 * ratio) as usize;
    let mut resampled = Vec::with_capacity(new_frame_count * channel_count);

    for i in 0..new_frame_count {
        let src_pos = i as f64 / ratio;
        let src_idx = src_pos as usize;
        let frac = src_pos - src_idx as f64;

        for ch in 0..channel_count {
            let idx0 = src_idx * channel_count + ch;
            let idx1 = ((src_idx + 1).min(frame_count - 1)) * channel_count + ch;

            let s0 = samples.get(idx0).copied().unwrap_or(0.0);
            let s1 = samples.get(idx1).copied().unwrap_or(s0);

            // 线性插值
            resampled.push(s0 + (s1 - s0) * frac as f32);
        }
    }

    resampled
}

/// 声道转换
///
/// 相同声道数直接返回；否则先混成单声道，再复制到目标声道数。
pub fn remix(samples: &[f32], from_channels: u16, to_channels: u16) -> Vec<f32> {
    if from_channels == to_channels || from_channels == 0 || to_channels == 0 {
        return samples.to_vec();
    }

    let from = from_channels as usize;
    let to = to_channels as usize;
    let frames = samples.len() / from;
    let mut out = Vec::with_capacity(frames * to);

    for frame in samples.chunks_exact(from) {
        let mono = frame.iter().sum::<f32>() / from as f32;
        out.extend(std::iter::repeat(mono).take(to));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_doubles_frames() {
        let samples = vec![0.0, 0.5, 1.0, 0.5];
        let out = resample(&samples, 8000, 16000, 1);
        assert_eq!(out.len(), 8);
        assert_eq!(out[0], 0.0);
        assert!((out[1] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_resample_same_rate_is_identity() {
        let samples = vec![0.1, -0.2, 0.3];
        assert_eq!(resample(&samples, 22050, 22050, 1), samples);
    }

    #[test]
    fn test_remix_stereo_to_mono() {
        let stereo = vec![1.0, 0.0, 0.5, 0.5];
        assert_eq!(remix(&stereo, 2, 1), vec![0.5, 0.5]);
    }

    #[test]
    fn test_remix_mono_to_stereo() {
        let mono = vec![0.25, -0.25];
        assert_eq!(remix(&mono, 1, 2), vec![0.25, 0.25, -0.25, -0.25]);
    }

    #[test]
    fn test_clip_duration() {
        let clip = DecodedClip {
            segment_index: 0,
            samples: vec![0.0; 16000 * 2],
            sample_rate: 16000,
            channels: 2,
        };
        assert_eq!(clip.frames(), 16000);
        assert_eq!(clip.duration_ms(), 1000);
    }

    #[test]
    fn test_clip_format_display() {
        assert_eq!(ClipFormat::Mp3.to_string(), "mp3");
        let pcm = ClipFormat::Pcm16 {
            sample_rate: 22050,
            channels: 1,
        };
        assert_eq!(pcm.to_string(), "pcm16(22050Hz, 1ch)");
        assert_eq!(pcm.extension(), "pcm");
    }
}
