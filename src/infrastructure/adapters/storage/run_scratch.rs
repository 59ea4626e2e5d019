//! File Scratch Space - 文件系统临时空间实现
//!
//! 实现 ScratchSpacePort / RunScratch trait。
//! 每次运行在根目录下拥有一个 `tempfile::TempDir`，片段以裸 f32 小端样本落盘；
//! `release()` 显式删除，未释放时随 `TempDir` 析构删除。

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tempfile::TempDir;
use tokio::fs;
use uuid::Uuid;

use crate::application::ports::{RunScratch, ScratchError, ScratchSpacePort, StoredClip};
use crate::domain::DecodedClip;

fn io_error(e: std::io::Error) -> ScratchError {
    ScratchError::IoError(e.to_string())
}

/// 文件系统临时空间
pub struct FileScratchSpace {
    /// 临时空间根目录
    root: PathBuf,
}

impl FileScratchSpace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 获取根目录
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 确保根目录存在
    pub async fn ensure_root(&self) -> Result<(), ScratchError> {
        fs::create_dir_all(&self.root).await.map_err(io_error)
    }
}

#[async_trait]
impl ScratchSpacePort for FileScratchSpace {
    async fn create(&self, run_id: Uuid) -> Result<Arc<dyn RunScratch>, ScratchError> {
        self.ensure_root().await?;

        let dir = tempfile::Builder::new()
            .prefix(&format!("run-{}-", run_id))
            .tempdir_in(&self.root)
            .map_err(io_error)?;

        tracing::debug!(run_id = %run_id, dir = %dir.path().display(), "Created scratch space");

        Ok(Arc::new(FileRunScratch {
            run_id,
            path: dir.path().to_path_buf(),
            dir: Mutex::new(Some(dir)),
        }))
    }
}

/// 单次运行的临时目录
pub struct FileRunScratch {
    run_id: Uuid,
    path: PathBuf,
    /// 释放后为 None
    dir: Mutex<Option<TempDir>>,
}

impl FileRunScratch {
    fn is_released(&self) -> bool {
        self.dir
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    fn clip_path(&self, segment_index: usize) -> PathBuf {
        self.path.join(format!("segment_{}.pcm", segment_index))
    }
}

#[async_trait]
impl RunScratch for FileRunScratch {
    fn run_id(&self) -> Uuid {
        self.run_id
    }

    fn dir(&self) -> &Path {
        &self.path
    }

    async fn save_clip(&self, clip: &DecodedClip) -> Result<StoredClip, ScratchError> {
        if self.is_released() {
            return Err(ScratchError::Released);
        }

        let path = self.clip_path(clip.segment_index);
        let bytes: Vec<u8> = clip.samples.iter().flat_map(|s| s.to_le_bytes()).collect();

        // 目录不存在时直接失败，不重新创建
        fs::write(&path, &bytes).await.map_err(io_error)?;

        tracing::debug!(
            segment_index = clip.segment_index,
            size = bytes.len(),
            "Spooled clip"
        );

        Ok(StoredClip {
            segment_index: clip.segment_index,
            path,
            sample_rate: clip.sample_rate,
            channels: clip.channels,
            samples: clip.samples.len(),
        })
    }

    async fn load_clip(&self, stored: &StoredClip) -> Result<DecodedClip, ScratchError> {
        if self.is_released() {
            return Err(ScratchError::Released);
        }

        let bytes = match fs::read(&stored.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ScratchError::FileNotFound(
                    stored.path.to_string_lossy().to_string(),
                ))
            }
            Err(e) => return Err(io_error(e)),
        };

        let samples: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        if samples.len() != stored.samples {
            return Err(ScratchError::IoError(format!(
                "clip {} truncated: expected {} samples, found {}",
                stored.segment_index,
                stored.samples,
                samples.len()
            )));
        }

        Ok(DecodedClip {
            segment_index: stored.segment_index,
            samples,
            sample_rate: stored.sample_rate,
            channels: stored.channels,
        })
    }

    async fn release(&self) -> Result<u64, ScratchError> {
        let dir = self
            .dir
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(dir) = dir else {
            return Ok(0);
        };

        let mut removed = 0u64;
        if let Ok(mut entries) = fs::read_dir(dir.path()).await {
            while let Ok(Some(_)) = entries.next_entry().await {
                removed += 1;
            }
        }

        tokio::task::spawn_blocking(move || dir.close())
            .await
            .map_err(|e| ScratchError::IoError(e.to_string()))?
            .map_err(io_error)?;

        tracing::debug!(run_id = %self.run_id, files = removed, "Released scratch space");
        Ok(removed)
    }
}
