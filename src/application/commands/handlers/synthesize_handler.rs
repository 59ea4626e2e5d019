//! Synthesize Speech Handler - 合成流水线编排
//!
//! 一次请求对应一次运行：分段 → 有界并发合成（按序号收集）→ 拼接 → 编码。
//! 任一片段失败即终止整个运行；运行结束时（无论成功、失败、超时或取消）释放临时空间。

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::application::commands::synthesize_commands::*;
use crate::application::error::PipelineError;
use crate::application::ports::{
    AudioCodecPort, BackendError, EncodedAudio, RunScratch, ScratchSpacePort, StoredClip,
    SynthesisBackend,
};
use crate::application::readiness::BackendReadiness;
use crate::application::retry::RetryPolicy;
use crate::domain::{segment_text, Assembler, AudioClip, PipelineRun, RunState, Segment};

type SegmentTasks = JoinSet<Result<StoredClip, PipelineError>>;

/// SynthesizeSpeech Handler - 文本转语音
pub struct SynthesizeSpeechHandler {
    backend: Arc<dyn SynthesisBackend>,
    codec: Arc<dyn AudioCodecPort>,
    scratch_space: Arc<dyn ScratchSpacePort>,
    readiness: Arc<BackendReadiness>,
    assembler: Assembler,
    config: PipelineConfig,
    /// 后端不可重入时串行化调用
    backend_lock: Option<Arc<Mutex<()>>>,
}

impl SynthesizeSpeechHandler {
    pub fn new(
        backend: Arc<dyn SynthesisBackend>,
        codec: Arc<dyn AudioCodecPort>,
        scratch_space: Arc<dyn ScratchSpacePort>,
        readiness: Arc<BackendReadiness>,
        config: PipelineConfig,
    ) -> Self {
        let backend_lock = if backend.is_reentrant() {
            None
        } else {
            Some(Arc::new(Mutex::new(())))
        };
        Self {
            assembler: Assembler::new(config.assembler.clone()),
            backend,
            codec,
            scratch_space,
            readiness,
            config,
            backend_lock,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn handle(
        &self,
        cmd: SynthesizeSpeechCommand,
        cancel: CancellationToken,
    ) -> Result<SynthesizeSpeechResponse, PipelineError> {
        if let Some(reason) = self.readiness.unavailable_reason() {
            return Err(PipelineError::BackendUnavailable {
                backend: self.backend.identity(),
                reason,
            });
        }

        let run = PipelineRun::new();
        let span = tracing::info_span!("run", run_id = %run.id, backend = %self.backend.identity());
        self.handle_run(run, cmd.text, cancel).instrument(span).await
    }

    async fn handle_run(
        &self,
        mut run: PipelineRun,
        text: String,
        cancel: CancellationToken,
    ) -> Result<SynthesizeSpeechResponse, PipelineError> {
        let scratch = self.scratch_space.create(run.id).await?;
        let mut tasks = SegmentTasks::new();

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PipelineError::Cancelled),
            result = tokio::time::timeout(
                self.config.run_timeout,
                self.execute(&mut run, &text, &scratch, &mut tasks),
            ) => match result {
                Ok(result) => result,
                Err(_) => Err(PipelineError::RunTimedOut {
                    timeout_secs: self.config.run_timeout.as_secs(),
                }),
            },
        };

        // 剩余任务必须先停下，才能删除临时目录
        tasks.shutdown().await;
        match scratch.release().await {
            Ok(removed) => tracing::debug!(removed, "Scratch space released"),
            Err(e) => tracing::warn!(error = %e, "Failed to release scratch space"),
        }

        match outcome {
            Ok(audio) => {
                run.advance(RunState::Done)?;
                tracing::info!(
                    segment_count = run.segment_count,
                    duration_ms = audio.duration_ms,
                    bytes = audio.data.len(),
                    elapsed_ms = run.elapsed_ms(),
                    "Run completed"
                );
                Ok(SynthesizeSpeechResponse {
                    run_id: run.id,
                    segment_count: run.segment_count,
                    audio,
                })
            }
            Err(err) => {
                let stage = run.state.as_str();
                if let Err(e) = run.fail(err.kind()) {
                    tracing::debug!(error = %e, "Run already terminal");
                }
                tracing::warn!(
                    stage,
                    kind = err.kind(),
                    segment_index = ?err.segment_index(),
                    error = %err,
                    elapsed_ms = run.elapsed_ms(),
                    "Run failed"
                );
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        run: &mut PipelineRun,
        text: &str,
        scratch: &Arc<dyn RunScratch>,
        tasks: &mut SegmentTasks,
    ) -> Result<EncodedAudio, PipelineError> {
        run.advance(RunState::Segmenting)?;
        let segments = segment_text(text, &self.config.segment)?;
        run.segment_count = segments.len();
        tracing::info!(
            segment_count = segments.len(),
            text_len = text.len(),
            "Text segmented"
        );

        run.advance(RunState::Synthesizing)?;
        let stored = self.synthesize_all(segments, scratch, tasks).await?;

        run.advance(RunState::Assembling)?;
        let mut clips = Vec::with_capacity(stored.len());
        for clip in &stored {
            clips.push(scratch.load_clip(clip).await?);
        }
        let track = self.assembler.assemble(clips)?;

        run.advance(RunState::Encoding)?;
        let audio = self.codec.encode(track, &self.config.encode).await?;
        Ok(audio)
    }

    /// 有界并发合成全部片段，结果按序号落入槽位
    async fn synthesize_all(
        &self,
        segments: Vec<Segment>,
        scratch: &Arc<dyn RunScratch>,
        tasks: &mut SegmentTasks,
    ) -> Result<Vec<StoredClip>, PipelineError> {
        let count = segments.len();
        let semaphore = Arc::new(Semaphore::new(self.config.worker_concurrency.max(1)));

        for segment in segments {
            let worker = SegmentWorker {
                backend: self.backend.clone(),
                codec: self.codec.clone(),
                scratch: scratch.clone(),
                lock: self.backend_lock.clone(),
                timeout: self.config.per_segment_timeout,
                retry: self.config.retry.clone(),
            };
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| PipelineError::InvalidState("worker pool closed".to_string()))?;
                worker.run(segment).await
            }
            .in_current_span());
        }

        let mut slots: Vec<Option<StoredClip>> = vec![None; count];
        while let Some(joined) = tasks.join_next().await {
            let result = joined.unwrap_or_else(|e| {
                Err(PipelineError::InvalidState(format!("segment task failed: {}", e)))
            });
            match result {
                Ok(stored) => match slots.get_mut(stored.segment_index) {
                    Some(slot) => *slot = Some(stored),
                    None => {
                        return Err(PipelineError::InvalidState(format!(
                            "segment index {} out of range",
                            stored.segment_index
                        )))
                    }
                },
                Err(err) => {
                    tasks.shutdown().await;
                    return Err(err);
                }
            }
        }

        let missing: Vec<usize> = slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_none())
            .map(|(index, _)| index)
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::IncompleteSynthesis { missing });
        }

        Ok(slots.into_iter().flatten().collect())
    }
}

/// 单个片段的合成任务
struct SegmentWorker {
    backend: Arc<dyn SynthesisBackend>,
    codec: Arc<dyn AudioCodecPort>,
    scratch: Arc<dyn RunScratch>,
    lock: Option<Arc<Mutex<()>>>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl SegmentWorker {
    async fn run(self, segment: Segment) -> Result<StoredClip, PipelineError> {
        let clip = self.synthesize_with_retry(&segment).await?;

        let decoded = self
            .codec
            .decode(&clip)
            .await
            .map_err(|e| PipelineError::FormatMismatch {
                segment_index: segment.index,
                detail: format!("undecodable {} clip: {}", clip.format, e),
            })?;

        let stored = self.scratch.save_clip(&decoded).await?;
        Ok(stored)
    }

    async fn synthesize_with_retry(&self, segment: &Segment) -> Result<AudioClip, PipelineError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let started = Instant::now();

            match self.synthesize_once(segment).await {
                Ok(clip) => {
                    tracing::debug!(
                        segment_index = segment.index,
                        attempt,
                        bytes = clip.data.len(),
                        format = %clip.format,
                        duration_ms = started.elapsed().as_millis() as u64,
                        "Segment synthesized"
                    );
                    return Ok(clip);
                }
                Err(err) if err.is_retryable() && self.retry.allows(attempt) => {
                    let hint = match &err {
                        BackendError::RateLimited { retry_after } => *retry_after,
                        _ => None,
                    };
                    let wait = self.retry.backoff(attempt, hint);
                    tracing::warn!(
                        segment_index = segment.index,
                        attempt,
                        error = %err,
                        backoff_ms = wait.as_millis() as u64,
                        "Segment synthesis failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(err) => {
                    tracing::warn!(
                        segment_index = segment.index,
                        attempt,
                        error = %err,
                        "Segment synthesis failed"
                    );
                    return Err(PipelineError::from_backend(
                        err,
                        segment.index,
                        self.backend.identity(),
                    ));
                }
            }
        }
    }

    async fn synthesize_once(&self, segment: &Segment) -> Result<AudioClip, BackendError> {
        let _guard = match &self.lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        let clip = tokio::time::timeout(self.timeout, self.backend.synthesize(segment))
            .await
            .map_err(|_| BackendError::Timeout)??;

        if clip.segment_index != segment.index {
            return Err(BackendError::SynthesisFailed(format!(
                "clip labelled for segment {}",
                clip.segment_index
            )));
        }
        Ok(clip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use tempfile::TempDir;

    use crate::application::ports::{
        BackendIdentity, BackendKind, CodecError, EncodeConfig, OutputFormat,
    };
    use crate::domain::{AssembledTrack, ClipFormat, DecodedClip, SegmentConfig};
    use crate::infrastructure::adapters::{FileScratchSpace, SymphoniaCodec};

    const RATE: u32 = 8000;

    /// 可编排的测试后端：每个片段输出 `(index + 1) * 10` 帧、值为 index 的 PCM
    #[derive(Default)]
    struct ScriptedBackend {
        fail_on: Option<(usize, BackendError)>,
        /// 该片段返回帧头完整但负载损坏的 MP3
        corrupt_on: Option<usize>,
        /// 片段前 N 次调用失败
        flaky: HashMap<usize, u32>,
        delay_ms: Option<fn(usize) -> u64>,
        reentrant: bool,
        calls: AtomicUsize,
        active: AtomicUsize,
        max_active: AtomicUsize,
        attempts: StdMutex<HashMap<usize, u32>>,
        seen: StdMutex<Vec<usize>>,
    }

    impl ScriptedBackend {
        fn new() -> Self {
            Self {
                reentrant: true,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl SynthesisBackend for ScriptedBackend {
        fn identity(&self) -> BackendIdentity {
            BackendIdentity::new(BackendKind::Fake, "scripted")
        }

        async fn synthesize(&self, segment: &Segment) -> Result<AudioClip, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(segment.index);
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(active, Ordering::SeqCst);

            if let Some(delay) = self.delay_ms {
                tokio::time::sleep(Duration::from_millis(delay(segment.index))).await;
            }
            self.active.fetch_sub(1, Ordering::SeqCst);

            let attempt = {
                let mut attempts = self.attempts.lock().unwrap();
                let entry = attempts.entry(segment.index).or_insert(0);
                *entry += 1;
                *entry
            };
            if let Some(failures) = self.flaky.get(&segment.index) {
                if attempt <= *failures {
                    return Err(BackendError::SynthesisFailed("flaky".into()));
                }
            }
            if let Some((index, err)) = &self.fail_on {
                if *index == segment.index {
                    return Err(err.clone());
                }
            }

            if self.corrupt_on == Some(segment.index) {
                let mut data = Vec::new();
                for _ in 0..20 {
                    data.extend_from_slice(&[0xFF, 0xFB, 0x90, 0x00]);
                    data.extend(std::iter::repeat(0xFF).take(413));
                }
                return Ok(AudioClip::new(segment.index, data, ClipFormat::Mp3));
            }

            let frames = (segment.index + 1) * 10;
            let value = (segment.index as i16) * 1000;
            let data = std::iter::repeat(value)
                .take(frames)
                .flat_map(|s| s.to_le_bytes())
                .collect();
            Ok(AudioClip::new(
                segment.index,
                data,
                ClipFormat::Pcm16 {
                    sample_rate: RATE,
                    channels: 1,
                },
            ))
        }

        fn is_reentrant(&self) -> bool {
            self.reentrant
        }
    }

    /// 测试编解码器：PCM16 进，PCM16 出
    struct PcmCodec;

    #[async_trait]
    impl AudioCodecPort for PcmCodec {
        async fn decode(&self, clip: &AudioClip) -> Result<DecodedClip, CodecError> {
            let ClipFormat::Pcm16 {
                sample_rate,
                channels,
            } = clip.format
            else {
                return Err(CodecError::UnsupportedFormat(clip.format.to_string()));
            };
            let samples = clip
                .data
                .chunks_exact(2)
                .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
                .collect();
            Ok(DecodedClip {
                segment_index: clip.segment_index,
                samples,
                sample_rate,
                channels,
            })
        }

        async fn encode(
            &self,
            track: AssembledTrack,
            config: &EncodeConfig,
        ) -> Result<EncodedAudio, CodecError> {
            let data = track
                .samples
                .iter()
                .flat_map(|s| ((s * 32768.0).round() as i16).to_le_bytes())
                .collect();
            Ok(EncodedAudio {
                data,
                format: config.format,
                duration_ms: track.duration_ms(),
                sample_rate: track.sample_rate,
                channels: track.channels,
            })
        }

        fn supports_format(&self, _format: OutputFormat) -> bool {
            true
        }
    }

    fn pipeline_config() -> PipelineConfig {
        PipelineConfig {
            segment: SegmentConfig::new(12),
            worker_concurrency: 2,
            per_segment_timeout: Duration::from_secs(5),
            run_timeout: Duration::from_secs(10),
            retry: RetryPolicy::fail_fast(),
            encode: EncodeConfig {
                format: OutputFormat::Wav,
                bitrate: 32000,
            },
            ..Default::default()
        }
    }

    fn handler(
        backend: Arc<ScriptedBackend>,
        root: &TempDir,
        config: PipelineConfig,
    ) -> SynthesizeSpeechHandler {
        handler_with_codec(backend, Arc::new(PcmCodec), root, config)
    }

    fn handler_with_codec(
        backend: Arc<ScriptedBackend>,
        codec: Arc<dyn AudioCodecPort>,
        root: &TempDir,
        config: PipelineConfig,
    ) -> SynthesizeSpeechHandler {
        SynthesizeSpeechHandler::new(
            backend,
            codec,
            Arc::new(FileScratchSpace::new(root.path())),
            Arc::new(BackendReadiness::ready()),
            config,
        )
    }

    fn command(text: &str) -> SynthesizeSpeechCommand {
        SynthesizeSpeechCommand {
            text: text.to_string(),
        }
    }

    /// 把输出 PCM 还原为片段序号序列（每帧一个）
    fn frame_labels(audio: &EncodedAudio) -> Vec<i16> {
        audio
            .data
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]) / 1000)
            .collect()
    }

    fn expected_labels(count: usize) -> Vec<i16> {
        (0..count)
            .flat_map(|i| std::iter::repeat(i as i16).take((i + 1) * 10))
            .collect()
    }

    fn scratch_is_empty(root: &TempDir) -> bool {
        std::fs::read_dir(root.path())
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true)
    }

    #[tokio::test]
    async fn test_three_segments_in_order() {
        let root = TempDir::new().unwrap();
        let backend = Arc::new(ScriptedBackend::new());
        let handler = handler(backend.clone(), &root, pipeline_config());

        let response = handler
            .handle(command("Hello world. This is a test."), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.segment_count, 3);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
        let mut seen = backend.seen.lock().unwrap().clone();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2]);

        // 10 + 20 + 30 帧 @ 8 kHz
        assert_eq!(response.audio.duration_ms, 60 * 1000 / RATE as u64);
        assert_eq!(frame_labels(&response.audio), expected_labels(3));
        assert!(scratch_is_empty(&root));
    }

    #[tokio::test]
    async fn test_order_independent_of_completion_timing() {
        let root = TempDir::new().unwrap();
        let backend = Arc::new(ScriptedBackend {
            // 序号越大完成越早
            delay_ms: Some(|index| 60u64.saturating_sub(index as u64 * 10)),
            ..ScriptedBackend::new()
        });
        let mut config = pipeline_config();
        config.segment = SegmentConfig::new(2);
        config.worker_concurrency = 6;
        let handler = handler(backend, &root, config);

        let response = handler
            .handle(command("a b c d e f"), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.segment_count, 6);
        assert_eq!(frame_labels(&response.audio), expected_labels(6));
    }

    #[tokio::test]
    async fn test_fail_fast_reports_failing_segment() {
        let root = TempDir::new().unwrap();
        let backend = Arc::new(ScriptedBackend {
            fail_on: Some((1, BackendError::SynthesisFailed("HTTP 500".into()))),
            ..ScriptedBackend::new()
        });
        let handler = handler(backend, &root, pipeline_config());

        let err = handler
            .handle(command("Hello world. This is a test."), CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            PipelineError::SynthesisFailed {
                segment_index,
                backend,
                ..
            } => {
                assert_eq!(segment_index, 1);
                assert_eq!(backend.name, "scripted");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(scratch_is_empty(&root));
    }

    #[tokio::test]
    async fn test_corrupt_clip_fails_run() {
        let root = TempDir::new().unwrap();
        let backend = Arc::new(ScriptedBackend {
            corrupt_on: Some(1),
            ..ScriptedBackend::new()
        });
        let handler = handler_with_codec(
            backend.clone(),
            Arc::new(SymphoniaCodec::new()),
            &root,
            pipeline_config(),
        );

        let err = handler
            .handle(command("Hello world. This is a test."), CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::FormatMismatch { segment_index: 1, .. }
        ));
        // 解码失败不重试
        assert!(backend.calls.load(Ordering::SeqCst) <= 3);
        assert!(scratch_is_empty(&root));
    }

    #[tokio::test]
    async fn test_retry_recovers_transient_failure() {
        let root = TempDir::new().unwrap();
        let backend = Arc::new(ScriptedBackend {
            flaky: HashMap::from([(0, 2)]),
            ..ScriptedBackend::new()
        });
        let mut config = pipeline_config();
        config.retry = RetryPolicy {
            max_retries: 2,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
        };
        let handler = handler(backend.clone(), &root, config);

        let response = handler
            .handle(command("Hello world. This is a test."), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.segment_count, 3);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 5);
        assert_eq!(frame_labels(&response.audio), expected_labels(3));
    }

    #[tokio::test]
    async fn test_retry_budget_exhausted() {
        let root = TempDir::new().unwrap();
        let backend = Arc::new(ScriptedBackend {
            flaky: HashMap::from([(0, 5)]),
            ..ScriptedBackend::new()
        });
        let mut config = pipeline_config();
        config.segment = SegmentConfig::new(100);
        config.retry = RetryPolicy {
            max_retries: 1,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
        };
        let handler = handler(backend.clone(), &root, config);

        let err = handler
            .handle(command("one segment"), CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::SynthesisFailed { segment_index: 0, .. }));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unavailable_is_not_retried() {
        let root = TempDir::new().unwrap();
        let backend = Arc::new(ScriptedBackend {
            fail_on: Some((0, BackendError::Unavailable("quota exhausted".into()))),
            ..ScriptedBackend::new()
        });
        let mut config = pipeline_config();
        config.segment = SegmentConfig::new(100);
        config.retry = RetryPolicy::default().with_retries(3);
        let handler = handler(backend.clone(), &root, config);

        let err = handler
            .handle(command("one segment"), CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::BackendUnavailable { .. }));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_segment_timeout() {
        let root = TempDir::new().unwrap();
        let backend = Arc::new(ScriptedBackend {
            delay_ms: Some(|index| if index == 2 { 2_000 } else { 0 }),
            ..ScriptedBackend::new()
        });
        let mut config = pipeline_config();
        config.per_segment_timeout = Duration::from_millis(50);
        let handler = handler(backend, &root, config);

        let err = handler
            .handle(command("Hello world. This is a test."), CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Timeout { segment_index: 2, .. }));
        assert!(scratch_is_empty(&root));
    }

    #[tokio::test]
    async fn test_run_timeout_releases_scratch() {
        let root = TempDir::new().unwrap();
        let backend = Arc::new(ScriptedBackend {
            delay_ms: Some(|_| 2_000),
            ..ScriptedBackend::new()
        });
        let mut config = pipeline_config();
        config.run_timeout = Duration::from_millis(50);
        let handler = handler(backend, &root, config);

        let err = handler
            .handle(command("Hello world. This is a test."), CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::RunTimedOut { .. }));
        assert!(scratch_is_empty(&root));
    }

    #[tokio::test]
    async fn test_cancellation_aborts_run() {
        let root = TempDir::new().unwrap();
        let backend = Arc::new(ScriptedBackend {
            delay_ms: Some(|_| 2_000),
            ..ScriptedBackend::new()
        });
        let handler = handler(backend, &root, pipeline_config());

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = handler
            .handle(command("Hello world. This is a test."), cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(scratch_is_empty(&root));
    }

    #[tokio::test]
    async fn test_worker_concurrency_bound() {
        let root = TempDir::new().unwrap();
        let backend = Arc::new(ScriptedBackend {
            delay_ms: Some(|_| 20),
            ..ScriptedBackend::new()
        });
        let mut config = pipeline_config();
        config.segment = SegmentConfig::new(2);
        config.worker_concurrency = 2;
        let handler = handler(backend.clone(), &root, config);

        handler
            .handle(command("a b c d e f"), CancellationToken::new())
            .await
            .unwrap();

        let max_active = backend.max_active.load(Ordering::SeqCst);
        assert!((1..=2).contains(&max_active));
    }

    #[tokio::test]
    async fn test_non_reentrant_backend_is_serialized() {
        let root = TempDir::new().unwrap();
        let backend = Arc::new(ScriptedBackend {
            delay_ms: Some(|_| 10),
            reentrant: false,
            ..ScriptedBackend::new()
        });
        let mut config = pipeline_config();
        config.segment = SegmentConfig::new(2);
        config.worker_concurrency = 4;
        let handler = handler(backend.clone(), &root, config);

        let response = handler
            .handle(command("a b c d e f"), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(backend.max_active.load(Ordering::SeqCst), 1);
        assert_eq!(frame_labels(&response.audio), expected_labels(6));
    }

    #[tokio::test]
    async fn test_not_ready_backend_rejects_without_calls() {
        let root = TempDir::new().unwrap();
        let backend = Arc::new(ScriptedBackend::new());
        let readiness = Arc::new(BackendReadiness::new());
        readiness.mark_unavailable("model file missing");
        let handler = SynthesizeSpeechHandler::new(
            backend.clone(),
            Arc::new(PcmCodec),
            Arc::new(FileScratchSpace::new(root.path())),
            readiness,
            pipeline_config(),
        );

        let err = handler
            .handle(command("hello"), CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            PipelineError::BackendUnavailable { reason, .. } => {
                assert_eq!(reason, "model file missing")
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_blank_text_is_invalid_input() {
        let root = TempDir::new().unwrap();
        let backend = Arc::new(ScriptedBackend::new());
        let handler = handler(backend.clone(), &root, pipeline_config());

        let err = handler
            .handle(command("   \n "), CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::InvalidInput(_)));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
        assert!(scratch_is_empty(&root));
    }
}
