//! Opus 编码（OGG 容器，RFC 7845）

use ogg::writing::{PacketWriteEndInfo, PacketWriter};
use opus::{Application, Channels, Encoder};

use super::wav::to_i16;
use crate::application::ports::CodecError;
use crate::domain::audio::{remix, resample};

/// granule position 固定按 48 kHz 计数
const GRANULE_RATE: u64 = 48_000;
/// 20 ms 一帧
const FRAME_MS: usize = 20;

/// 编码后的 Opus 流
#[derive(Debug)]
pub struct OpusStream {
    pub data: Vec<u8>,
    /// 编码器实际使用的采样率
    pub sample_rate: u32,
    pub channels: u16,
}

/// 获取 Opus 兼容的采样率
///
/// Opus 支持: 8000, 12000, 16000, 24000, 48000
pub fn opus_sample_rate(sample_rate: u32) -> u32 {
    match sample_rate {
        8000 | 12000 | 16000 | 24000 | 48000 => sample_rate,
        r if r <= 8000 => 8000,
        r if r <= 12000 => 12000,
        r if r <= 16000 => 16000,
        r if r <= 24000 => 24000,
        _ => 48000,
    }
}

fn encoding_error(context: &str, err: impl std::fmt::Display) -> CodecError {
    CodecError::EncodingError(format!("{}: {}", context, err))
}

/// 把交错的 f32 样本编码为 Ogg/Opus
pub fn encode(
    samples: &[f32],
    sample_rate: u32,
    channels: u16,
    bitrate: u32,
) -> Result<OpusStream, CodecError> {
    if sample_rate == 0 || channels == 0 {
        return Err(CodecError::InvalidInput(format!(
            "invalid track layout: {} Hz, {} channels",
            sample_rate, channels
        )));
    }

    // Opus 仅支持单声道或立体声
    let (samples, channels) = if channels > 2 {
        (remix(samples, channels, 2), 2u16)
    } else {
        (samples.to_vec(), channels)
    };

    let target_rate = opus_sample_rate(sample_rate);
    let samples = resample(&samples, sample_rate, target_rate, channels);
    let sample_rate = target_rate;

    let channel_count = channels as usize;
    let mode = if channels == 1 {
        Channels::Mono
    } else {
        Channels::Stereo
    };

    // Application::Voip 针对语音优化
    let mut encoder = Encoder::new(sample_rate, mode, Application::Voip)
        .map_err(|e| encoding_error("Failed to create Opus encoder", e))?;
    encoder
        .set_bitrate(opus::Bitrate::Bits(bitrate as i32))
        .map_err(|e| encoding_error("Failed to set bitrate", e))?;

    let granule_scale = GRANULE_RATE as f64 / sample_rate as f64;

    // 编码器延迟（编码采样率下的帧数），OpusHead 中的 pre-skip 以 48 kHz 计
    let lookahead = encoder.get_lookahead().map(|l| l.max(0) as usize).unwrap_or(312);
    let pre_skip = ((lookahead as f64 * granule_scale) as u64).min(u16::MAX as u64) as u16;

    let frame_size = sample_rate as usize * FRAME_MS / 1000;
    let samples_per_frame = frame_size * channel_count;
    let frame_granule = (frame_size as f64 * granule_scale) as u64;

    let content_frames = samples.len() / channel_count;
    let final_granule = pre_skip as u64 + (content_frames as f64 * granule_scale) as u64;

    // 延迟中缓存的样本需要额外的静音帧刷出，至少一帧用于结束流
    let flush_frames = ((lookahead + frame_size - 1) / frame_size).max(1);

    let pcm: Vec<i16> = samples.iter().map(|s| to_i16(*s)).collect();

    let mut ogg_data = Vec::new();
    {
        let mut writer = PacketWriter::new(&mut ogg_data);

        writer
            .write_packet(
                opus_head(channels as u8, sample_rate, pre_skip),
                0,
                PacketWriteEndInfo::EndPage,
                0,
            )
            .map_err(|e| encoding_error("Failed to write Opus head", e))?;
        writer
            .write_packet(opus_tags(), 0, PacketWriteEndInfo::EndPage, 0)
            .map_err(|e| encoding_error("Failed to write Opus tags", e))?;

        // Opus 最大包大小
        let mut output_buf = vec![0u8; 4000];
        let mut granule_pos: u64 = 0;

        for chunk in pcm.chunks(samples_per_frame) {
            // 最后一帧不完整时补零
            let frame = if chunk.len() < samples_per_frame {
                let mut padded = chunk.to_vec();
                padded.resize(samples_per_frame, 0);
                padded
            } else {
                chunk.to_vec()
            };

            let encoded_len = encoder
                .encode(&frame, &mut output_buf)
                .map_err(|e| encoding_error("Opus encode failed", e))?;
            granule_pos += frame_granule;

            writer
                .write_packet(
                    output_buf[..encoded_len].to_vec(),
                    0,
                    PacketWriteEndInfo::NormalPacket,
                    granule_pos,
                )
                .map_err(|e| encoding_error("Failed to write Opus packet", e))?;
        }

        let silence = vec![0i16; samples_per_frame];
        for flush_idx in 0..flush_frames {
            let encoded_len = encoder
                .encode(&silence, &mut output_buf)
                .map_err(|e| encoding_error("Opus flush encode failed", e))?;
            granule_pos += frame_granule;

            // 最后一页的 granule 标记真实结尾，解码端据此裁掉补齐的静音
            let (end_info, granule) = if flush_idx == flush_frames - 1 {
                (PacketWriteEndInfo::EndStream, final_granule.min(granule_pos))
            } else {
                (PacketWriteEndInfo::NormalPacket, granule_pos)
            };

            writer
                .write_packet(output_buf[..encoded_len].to_vec(), 0, end_info, granule)
                .map_err(|e| encoding_error("Failed to write Opus flush packet", e))?;
        }
    }

    Ok(OpusStream {
        data: ogg_data,
        sample_rate,
        channels,
    })
}

/// Opus Head 包 (RFC 7845)
fn opus_head(channels: u8, sample_rate: u32, pre_skip: u16) -> Vec<u8> {
    let mut head = Vec::with_capacity(19);
    head.extend_from_slice(b"OpusHead");
    head.push(1); // version
    head.push(channels);
    head.extend_from_slice(&pre_skip.to_le_bytes());
    head.extend_from_slice(&sample_rate.to_le_bytes()); // input sample rate
    head.extend_from_slice(&0i16.to_le_bytes()); // output gain
    head.push(0); // channel mapping family
    head
}

fn opus_tags() -> Vec<u8> {
    let vendor = concat!("parlo ", env!("CARGO_PKG_VERSION"));
    let mut tags = Vec::new();
    tags.extend_from_slice(b"OpusTags");
    tags.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
    tags.extend_from_slice(vendor.as_bytes());
    tags.extend_from_slice(&0u32.to_le_bytes()); // no user comments
    tags
}
