//! Symphonia Codec - 基于 symphonia 的片段解码与音轨编码
//!
//! 支持：
//! - 解码后端片段：WAV / MP3（symphonia）、裸 16 位 PCM
//! - 编码音轨：WAV（16 位 PCM）、Opus（OGG 容器）

use async_trait::async_trait;
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::{ogg_opus, wav};
use crate::application::ports::{
    AudioCodecPort, CodecError, EncodeConfig, EncodedAudio, OutputFormat,
};
use crate::domain::{AssembledTrack, AudioClip, ClipFormat, DecodedClip};

/// 基于 symphonia 的编解码器
#[derive(Debug, Clone, Default)]
pub struct SymphoniaCodec;

impl SymphoniaCodec {
    pub fn new() -> Self {
        Self
    }
}

/// 同步解码，运行在阻塞线程池中
fn decode_clip(clip: &AudioClip) -> Result<DecodedClip, CodecError> {
    if clip.data.is_empty() {
        return Err(CodecError::InvalidInput("empty audio clip".to_string()));
    }

    let decoded = match clip.format {
        ClipFormat::Pcm16 {
            sample_rate,
            channels,
        } => decode_pcm16(clip, sample_rate, channels)?,
        ClipFormat::Wav | ClipFormat::Mp3 => decode_container(clip)?,
    };

    // 非空数据解不出任何帧，说明内容损坏
    if decoded.samples.is_empty() {
        return Err(CodecError::DecodingError(format!(
            "no audio frames in {} byte {} clip",
            clip.data.len(),
            clip.format
        )));
    }
    Ok(decoded)
}

/// 裸 16 位小端 PCM
fn decode_pcm16(
    clip: &AudioClip,
    sample_rate: u32,
    channels: u16,
) -> Result<DecodedClip, CodecError> {
    if sample_rate == 0 || channels == 0 {
        return Err(CodecError::InvalidInput(format!(
            "invalid pcm layout: {} Hz, {} channels",
            sample_rate, channels
        )));
    }

    let mut samples: Vec<f32> = clip
        .data
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
        .collect();
    // 丢掉不完整的最后一帧
    samples.truncate(samples.len() - samples.len() % channels as usize);

    Ok(DecodedClip {
        segment_index: clip.segment_index,
        samples,
        sample_rate,
        channels,
    })
}

/// 使用 symphonia 解码容器格式
///
/// 任何一个包解码失败都视为整个片段损坏
fn decode_container(clip: &AudioClip) -> Result<DecodedClip, CodecError> {
    let cursor = Cursor::new(clip.data.clone());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    let mut hint = Hint::new();
    hint.with_extension(clip.format.extension());

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| CodecError::DecodingError(format!("Probe failed: {}", e)))?;

    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| CodecError::DecodingError("No audio track found".to_string()))?;

    let mut sample_rate = track.codec_params.sample_rate;
    let mut channels = track.codec_params.channels.map(|c| c.count() as u16);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| CodecError::DecodingError(format!("Decoder creation failed: {}", e)))?;

    let mut samples: Vec<f32> = Vec::new();
    let track_id = track.id;
    let mut packets = 0usize;
    let mut failed = 0usize;
    let mut first_error: Option<String> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                return Err(CodecError::DecodingError(format!(
                    "Packet read error: {}",
                    e
                )));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }
        packets += 1;

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(e) => {
                failed += 1;
                first_error.get_or_insert_with(|| e.to_string());
                continue;
            }
        };

        // MP3 的流参数以实际解码出的帧为准
        let spec = *decoded.spec();
        sample_rate = Some(spec.rate);
        channels = Some(spec.channels.count() as u16);

        let num_frames = decoded.frames();
        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        let actual_samples = num_frames * spec.channels.count();
        samples.extend(&sample_buf.samples()[..actual_samples]);
    }

    if failed > 0 {
        tracing::warn!(
            segment_index = clip.segment_index,
            failed,
            packets,
            "Clip has undecodable packets"
        );
        return Err(CodecError::DecodingError(format!(
            "{} of {} packets undecodable: {}",
            failed,
            packets,
            first_error.unwrap_or_default()
        )));
    }

    let sample_rate =
        sample_rate.ok_or_else(|| CodecError::DecodingError("Unknown sample rate".to_string()))?;
    let channels =
        channels.ok_or_else(|| CodecError::DecodingError("Unknown channel count".to_string()))?;

    Ok(DecodedClip {
        segment_index: clip.segment_index,
        samples,
        sample_rate,
        channels,
    })
}

/// 同步编码，运行在阻塞线程池中
fn encode_track(track: AssembledTrack, config: &EncodeConfig) -> Result<EncodedAudio, CodecError> {
    let duration_ms = track.duration_ms();

    match config.format {
        OutputFormat::Wav => {
            let data = wav::encode_pcm16(&track.samples, track.sample_rate, track.channels)?;
            Ok(EncodedAudio {
                data,
                format: OutputFormat::Wav,
                duration_ms,
                sample_rate: track.sample_rate,
                channels: track.channels,
            })
        }
        OutputFormat::Opus => {
            let stream = ogg_opus::encode(
                &track.samples,
                track.sample_rate,
                track.channels,
                config.bitrate,
            )?;
            tracing::debug!(
                pcm_samples = track.samples.len(),
                opus_size = stream.data.len(),
                bitrate = config.bitrate,
                "Encoded to Opus"
            );
            Ok(EncodedAudio {
                data: stream.data,
                format: OutputFormat::Opus,
                duration_ms,
                sample_rate: stream.sample_rate,
                channels: stream.channels,
            })
        }
    }
}

#[async_trait]
impl AudioCodecPort for SymphoniaCodec {
    async fn decode(&self, clip: &AudioClip) -> Result<DecodedClip, CodecError> {
        let clip = clip.clone();
        tokio::task::spawn_blocking(move || decode_clip(&clip))
            .await
            .map_err(|e| CodecError::DecodingError(format!("decoder task failed: {}", e)))?
    }

    async fn encode(
        &self,
        track: AssembledTrack,
        config: &EncodeConfig,
    ) -> Result<EncodedAudio, CodecError> {
        let config = config.clone();
        tokio::task::spawn_blocking(move || encode_track(track, &config))
            .await
            .map_err(|e| CodecError::EncodingError(format!("encoder task failed: {}", e)))?
    }

    fn supports_format(&self, format: OutputFormat) -> bool {
        match format {
            OutputFormat::Wav => true,
            OutputFormat::Opus => true,
        }
    }
}
