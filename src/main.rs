//! Parlo - 文本转语音服务
//!
//! 启动流程：加载配置、初始化日志、加载后端、启动 HTTP 服务

use std::sync::Arc;

use parlo::application::{BackendReadiness, SynthesisBackend};
use parlo::config::{load_config, print_config, AppConfig, BackendKindConfig, LogConfig};
use parlo::infrastructure::adapters::{
    FakeSynthesisBackend, FileScratchSpace, HttpSynthesisBackend, PiperBackend, SymphoniaCodec,
};
use parlo::infrastructure::http::{AppState, HttpServer, ServerConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

fn init_logging(log: &LogConfig) {
    let log_filter = format!("{},parlo={},tower_http=debug", log.level, log.level);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter));

    if log.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// 按配置创建合成后端
fn build_backend(config: &AppConfig) -> anyhow::Result<Arc<dyn SynthesisBackend>> {
    let backend: Arc<dyn SynthesisBackend> = match config.backend.kind {
        BackendKindConfig::Http => Arc::new(HttpSynthesisBackend::new(
            config.backend.http.to_backend_config(),
        )?),
        BackendKindConfig::Piper => {
            let piper = config
                .backend
                .piper
                .to_backend_config()
                .ok_or_else(|| anyhow::anyhow!("backend.piper.model_path is not set"))?;
            Arc::new(PiperBackend::new(piper))
        }
        BackendKindConfig::Fake => Arc::new(FakeSynthesisBackend::new(
            config.backend.fake.to_backend_config(),
        )),
    };
    Ok(backend)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    init_logging(&config.log);

    tracing::info!("Parlo {} starting", env!("CARGO_PKG_VERSION"));
    print_config(&config);

    // 后端加载失败时服务仍然启动，由 /health 暴露原因
    let backend = build_backend(&config)?;
    let readiness = Arc::new(BackendReadiness::new());
    match backend.load().await {
        Ok(()) => {
            readiness.mark_ready();
            tracing::info!(backend = %backend.identity(), "Synthesis backend ready");
        }
        Err(e) => {
            tracing::warn!(backend = %backend.identity(), error = %e, "Synthesis backend unavailable");
            readiness.mark_unavailable(e.to_string());
        }
    }

    let scratch_space = FileScratchSpace::new(&config.storage.scratch_dir);
    scratch_space.ensure_root().await?;

    let shutdown = CancellationToken::new();
    let state = AppState::new(
        backend,
        Arc::new(SymphoniaCodec::new()),
        Arc::new(scratch_space),
        readiness,
        config.pipeline_config(),
        shutdown,
    );

    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
        max_body_bytes: config.server.max_body_bytes,
    };
    let server = HttpServer::new(server_config, state);

    server
        .run_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}
