//! Domain Layer - 领域层
//!
//! 与 I/O 无关的合成流水线核心：
//! - text_segmenter: 文本分段
//! - audio: 音频值对象与采样工具
//! - assembler: 按序拼接
//! - run: 单次运行的状态机

pub mod assembler;
pub mod audio;
pub mod run;
mod text_segmenter;

pub use assembler::{Assembler, AssemblerConfig, AssemblyError};
pub use audio::{AssembledTrack, AudioClip, ClipFormat, DecodedClip};
pub use run::{PipelineRun, RunError, RunState};
pub use text_segmenter::{
    reconstruct, segment_text, LengthUnit, OversizePolicy, Segment, SegmentConfig, SegmentError,
    DEFAULT_MAX_SEGMENT_LENGTH,
};
