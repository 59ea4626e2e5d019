//! 16 位 PCM WAV 写入

use crate::application::ports::CodecError;

/// 把交错的 f32 样本写成 16 位 PCM WAV
pub fn encode_pcm16(samples: &[f32], sample_rate: u32, channels: u16) -> Result<Vec<u8>, CodecError> {
    if sample_rate == 0 || channels == 0 {
        return Err(CodecError::InvalidInput(format!(
            "invalid wav layout: {} Hz, {} channels",
            sample_rate, channels
        )));
    }

    let bits_per_sample: u16 = 16;
    let byte_rate = sample_rate * channels as u32 * (bits_per_sample / 8) as u32;
    let block_align = channels * (bits_per_sample / 8);

    let data_size = samples.len() * 2;
    let data_size_u32 = u32::try_from(data_size)
        .ok()
        .filter(|size| *size <= u32::MAX - 36)
        .ok_or_else(|| CodecError::EncodingError("track too long for WAV".to_string()))?;

    let mut wav = Vec::with_capacity(44 + data_size);

    // RIFF header
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_size_u32).to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    // fmt chunk
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&channels.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&bits_per_sample.to_le_bytes());

    // data chunk
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_size_u32.to_le_bytes());
    for sample in samples {
        wav.extend_from_slice(&to_i16(*sample).to_le_bytes());
    }

    Ok(wav)
}

pub(crate) fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32767.0) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let wav = encode_pcm16(&[0.0, 0.5, -0.5, 1.0], 16000, 2).unwrap();
        assert_eq!(wav.len(), 44 + 8);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(u16::from_le_bytes([wav[22], wav[23]]), 2);
        assert_eq!(u32::from_le_bytes([wav[24], wav[25], wav[26], wav[27]]), 16000);
        assert_eq!(u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]), 8);
        assert_eq!(i16::from_le_bytes([wav[50], wav[51]]), 32767);
    }

    #[test]
    fn test_clamps_out_of_range() {
        assert_eq!(to_i16(3.0), 32767);
        assert_eq!(to_i16(-3.0), -32767);
    }

    #[test]
    fn test_rejects_zero_channels() {
        assert!(encode_pcm16(&[0.0], 16000, 0).is_err());
    }
}
