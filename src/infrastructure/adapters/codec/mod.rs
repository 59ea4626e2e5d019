//! Codec Adapter - 音频编解码实现

mod ogg_opus;
mod symphonia_codec;
pub mod wav;

pub use symphonia_codec::SymphoniaCodec;
