//! Status Query Handlers

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::application::ports::{BackendIdentity, OutputFormat, SynthesisBackend};
use crate::application::queries::GetBackendStatus;
use crate::application::readiness::BackendReadiness;

// ============================================================================
// Response DTOs
// ============================================================================

/// 后端状态
#[derive(Debug, Clone)]
pub struct BackendStatus {
    pub backend: BackendIdentity,
    /// 是否可以接受合成请求
    pub ready: bool,
    /// 不可用原因
    pub error: Option<String>,
    pub output_format: OutputFormat,
    pub checked_at: DateTime<Utc>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GetBackendStatus Handler
pub struct GetBackendStatusHandler {
    backend: Arc<dyn SynthesisBackend>,
    readiness: Arc<BackendReadiness>,
    output_format: OutputFormat,
}

impl GetBackendStatusHandler {
    pub fn new(
        backend: Arc<dyn SynthesisBackend>,
        readiness: Arc<BackendReadiness>,
        output_format: OutputFormat,
    ) -> Self {
        Self {
            backend,
            readiness,
            output_format,
        }
    }

    pub async fn handle(&self, _query: GetBackendStatus) -> BackendStatus {
        // 未加载成功时不再探测后端
        let error = match self.readiness.unavailable_reason() {
            Some(reason) => Some(reason),
            None if self.backend.health_check().await => None,
            None => Some("backend health check failed".to_string()),
        };

        BackendStatus {
            backend: self.backend.identity(),
            ready: error.is_none(),
            error,
            output_format: self.output_format,
            checked_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::application::ports::{BackendError, BackendKind};
    use crate::domain::{AudioClip, Segment};

    struct ProbeBackend {
        healthy: bool,
        probes: AtomicUsize,
    }

    #[async_trait]
    impl SynthesisBackend for ProbeBackend {
        fn identity(&self) -> BackendIdentity {
            BackendIdentity::new(BackendKind::Http, "probe")
        }

        async fn synthesize(&self, _segment: &Segment) -> Result<AudioClip, BackendError> {
            Err(BackendError::SynthesisFailed("not used".into()))
        }

        async fn health_check(&self) -> bool {
            self.probes.fetch_add(1, Ordering::SeqCst);
            self.healthy
        }
    }

    fn backend(healthy: bool) -> Arc<ProbeBackend> {
        Arc::new(ProbeBackend {
            healthy,
            probes: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_ready_and_healthy() {
        let handler = GetBackendStatusHandler::new(
            backend(true),
            Arc::new(BackendReadiness::ready()),
            OutputFormat::Opus,
        );
        let status = handler.handle(GetBackendStatus).await;
        assert!(status.ready);
        assert!(status.error.is_none());
        assert_eq!(status.backend.name, "probe");
        assert_eq!(status.output_format, OutputFormat::Opus);
    }

    #[tokio::test]
    async fn test_failed_health_check() {
        let handler = GetBackendStatusHandler::new(
            backend(false),
            Arc::new(BackendReadiness::ready()),
            OutputFormat::Wav,
        );
        let status = handler.handle(GetBackendStatus).await;
        assert!(!status.ready);
        assert_eq!(status.error.as_deref(), Some("backend health check failed"));
    }

    #[tokio::test]
    async fn test_load_failure_skips_probe() {
        let probe = backend(true);
        let readiness = Arc::new(BackendReadiness::new());
        readiness.mark_unavailable("missing api key");
        let handler = GetBackendStatusHandler::new(probe.clone(), readiness, OutputFormat::Wav);

        let status = handler.handle(GetBackendStatus).await;
        assert!(!status.ready);
        assert_eq!(status.error.as_deref(), Some("missing api key"));
        assert_eq!(probe.probes.load(Ordering::SeqCst), 0);
    }
}
