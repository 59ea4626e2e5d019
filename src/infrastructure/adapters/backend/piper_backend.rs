//! Piper Backend - 本地语音模型
//!
//! 每个片段启动一次 `piper --model <model> --output_raw`，文本写入 stdin，
//! stdout 为 16 位单声道 PCM。模型配置（`<model>.json`）在 `load()` 时解析一次，之后只读。

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::application::ports::{BackendError, BackendIdentity, BackendKind, SynthesisBackend};
use crate::domain::{AudioClip, ClipFormat, Segment};

/// Piper 后端配置
#[derive(Debug, Clone)]
pub struct PiperBackendConfig {
    /// piper 可执行文件
    pub binary: PathBuf,
    /// `.onnx` 模型路径，配置文件为同名 `.json`
    pub model_path: PathBuf,
    /// 串行化调用（一次只运行一个 piper 进程）
    pub serialize: bool,
}

impl PiperBackendConfig {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            binary: PathBuf::from("piper"),
            model_path: model_path.into(),
            serialize: true,
        }
    }

    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    fn voice_config_path(&self) -> PathBuf {
        let mut path = self.model_path.clone().into_os_string();
        path.push(".json");
        PathBuf::from(path)
    }
}

/// 模型配置中用到的部分
#[derive(Debug, Deserialize)]
struct VoiceConfig {
    audio: VoiceAudio,
}

#[derive(Debug, Deserialize)]
struct VoiceAudio {
    sample_rate: u32,
}

/// 已加载的声音
#[derive(Debug, Clone)]
struct PiperVoice {
    sample_rate: u32,
}

async fn read_voice_config(path: &Path) -> Result<PiperVoice, BackendError> {
    let raw = tokio::fs::read(path).await.map_err(|e| {
        BackendError::Unavailable(format!("cannot read voice config {}: {}", path.display(), e))
    })?;
    let config: VoiceConfig = serde_json::from_slice(&raw).map_err(|e| {
        BackendError::Unavailable(format!("invalid voice config {}: {}", path.display(), e))
    })?;
    if config.audio.sample_rate == 0 {
        return Err(BackendError::Unavailable(format!(
            "voice config {} has zero sample rate",
            path.display()
        )));
    }
    Ok(PiperVoice {
        sample_rate: config.audio.sample_rate,
    })
}

/// Piper 本地模型后端
pub struct PiperBackend {
    config: PiperBackendConfig,
    name: String,
    voice: OnceLock<PiperVoice>,
}

impl PiperBackend {
    pub fn new(config: PiperBackendConfig) -> Self {
        let name = config
            .model_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "piper".to_string());
        Self {
            config,
            name,
            voice: OnceLock::new(),
        }
    }

    /// 确认可执行文件能启动；只把启动失败视为不可用
    async fn probe_binary(&self) -> Result<(), BackendError> {
        let mut child = Command::new(&self.config.binary)
            .arg("--help")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                BackendError::Unavailable(format!(
                    "cannot run {}: {}",
                    self.config.binary.display(),
                    e
                ))
            })?;

        if tokio::time::timeout(Duration::from_secs(10), child.wait())
            .await
            .is_err()
        {
            tracing::debug!(binary = %self.config.binary.display(), "piper --help did not exit, continuing");
        }
        Ok(())
    }
}

#[async_trait]
impl SynthesisBackend for PiperBackend {
    fn identity(&self) -> BackendIdentity {
        BackendIdentity::new(BackendKind::Piper, self.name.clone())
    }

    async fn load(&self) -> Result<(), BackendError> {
        if tokio::fs::metadata(&self.config.model_path).await.is_err() {
            return Err(BackendError::Unavailable(format!(
                "model not found: {}",
                self.config.model_path.display()
            )));
        }
        let voice = read_voice_config(&self.config.voice_config_path()).await?;
        self.probe_binary().await?;

        tracing::info!(
            model = %self.config.model_path.display(),
            sample_rate = voice.sample_rate,
            "Piper voice loaded"
        );
        if self.voice.set(voice).is_err() {
            tracing::debug!("Piper voice already loaded");
        }
        Ok(())
    }

    async fn synthesize(&self, segment: &Segment) -> Result<AudioClip, BackendError> {
        let voice = self
            .voice
            .get()
            .ok_or_else(|| BackendError::Unavailable("voice model not loaded".to_string()))?;

        let mut child = Command::new(&self.config.binary)
            .arg("--model")
            .arg(&self.config.model_path)
            .arg("--output_raw")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BackendError::Unavailable(format!("cannot run piper: {}", e)))?;

        // piper 按行合成，片段内的换行合并为空格
        let line = segment.text.split_whitespace().collect::<Vec<_>>().join(" ");
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(line.as_bytes())
                .await
                .map_err(|e| BackendError::SynthesisFailed(format!("write to piper failed: {}", e)))?;
            stdin
                .write_all(b"\n")
                .await
                .map_err(|e| BackendError::SynthesisFailed(format!("write to piper failed: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| BackendError::SynthesisFailed(format!("piper did not finish: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BackendError::SynthesisFailed(format!(
                "piper exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let mut data = output.stdout;
        if data.is_empty() {
            return Err(BackendError::SynthesisFailed(
                "piper produced no audio".to_string(),
            ));
        }
        data.truncate(data.len() & !1);

        tracing::debug!(
            segment_index = segment.index,
            audio_size = data.len(),
            "Piper synthesis completed"
        );

        Ok(AudioClip::new(
            segment.index,
            data,
            ClipFormat::Pcm16 {
                sample_rate: voice.sample_rate,
                channels: 1,
            },
        ))
    }

    async fn health_check(&self) -> bool {
        self.voice.get().is_some() && tokio::fs::metadata(&self.config.model_path).await.is_ok()
    }

    fn is_reentrant(&self) -> bool {
        !self.config.serialize
    }
}
