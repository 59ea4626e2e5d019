//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod audio_codec;
mod run_scratch;
mod synthesis_backend;

pub use audio_codec::{AudioCodecPort, CodecError, EncodeConfig, EncodedAudio, OutputFormat};
pub use run_scratch::{RunScratch, ScratchError, ScratchSpacePort, StoredClip};
pub use synthesis_backend::{BackendError, BackendIdentity, BackendKind, SynthesisBackend};
