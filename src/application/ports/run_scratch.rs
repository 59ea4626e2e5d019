//! Run Scratch Port - 单次运行的临时存储
//!
//! 每次运行拥有独立的临时目录，存放逐段解码后的片段；
//! 运行结束（成功、失败、超时、取消）时必须释放

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::DecodedClip;

/// 临时存储错误
#[derive(Debug, Error)]
pub enum ScratchError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Scratch space already released")]
    Released,
}

/// 已落盘片段的句柄
#[derive(Debug, Clone)]
pub struct StoredClip {
    pub segment_index: usize,
    pub path: PathBuf,
    pub sample_rate: u32,
    pub channels: u16,
    /// 样本数
    pub samples: usize,
}

/// 单次运行的临时空间
#[async_trait]
pub trait RunScratch: Send + Sync {
    /// 运行 ID
    fn run_id(&self) -> Uuid;

    /// 临时目录
    fn dir(&self) -> &Path;

    /// 保存解码后的片段
    async fn save_clip(&self, clip: &DecodedClip) -> Result<StoredClip, ScratchError>;

    /// 读取片段
    async fn load_clip(&self, stored: &StoredClip) -> Result<DecodedClip, ScratchError>;

    /// 删除临时目录，返回删除的文件数；重复调用返回 0
    async fn release(&self) -> Result<u64, ScratchError>;
}

/// Scratch Space Port - 为每次运行分配临时空间
#[async_trait]
pub trait ScratchSpacePort: Send + Sync {
    async fn create(&self, run_id: Uuid) -> Result<Arc<dyn RunScratch>, ScratchError>;
}
