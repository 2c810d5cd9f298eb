pub mod config;
pub mod downloader;
pub mod gateway;
pub mod http;

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};

use config::AppConfig;
use downloader::{staging_root, utils, CapabilityProbe, ToolManager, ToolType, YtDlpBackend};
use gateway::RequestGateway;
use http::AppState;

/// Wire the gateway to the host tools and serve the web interface until shutdown
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let tools = Arc::new(ToolManager::new(config.tool_paths()));
    let probe: Arc<dyn CapabilityProbe> = tools.clone();

    if !tools.is_present(ToolType::YtDlp) {
        warn!("yt-dlp was not found; downloads will fail until it is installed");
    }
    if !probe.probe().has_transcoder {
        warn!("ffmpeg/ffprobe not found; downloads will skip post-processing");
    }

    let output_dir = &config.output_dir;
    tokio::fs::create_dir_all(output_dir)
        .await
        .with_context(|| format!("failed to create output directory {}", output_dir.display()))?;

    // No job runs yet, so anything staged belongs to a previous process
    let stale = utils::sweep_staging(&staging_root(output_dir)).await;
    if stale > 0 {
        info!(count = stale, "removed stale staging directories");
    }

    let backend = Arc::new(YtDlpBackend::new(
        tools.ytdlp_command(),
        config.network(),
        config.fetch_timeout(),
    ));
    let gateway = RequestGateway::new(config.gateway(), probe.clone(), backend);

    let app = http::router(AppState {
        gateway: Arc::new(gateway),
        probe,
        tools,
    });

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    info!(
        addr = %config.bind,
        output_dir = %output_dir.display(),
        "media grabber listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server terminated unexpectedly")
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}
