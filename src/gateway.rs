//! Request gateway: validates a download request, resolves its format policy
//! and runs it as a single job.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::downloader::{
    AcquisitionJob, CapabilityProbe, FailureKind, FetchBackend, FormatSelector, JobExecutor,
    JobOutcome, MediaKind, QualityTier,
};

pub const INVALID_URL_MESSAGE: &str = "Please provide a valid URL";
pub const COMPLETED_MESSAGE: &str = "Download completed successfully!";
pub const MISSING_TRANSCODER_MESSAGE: &str =
    "FFmpeg is required but not installed. Please install FFmpeg to continue.";

/// Settings the gateway is built with; nothing is read from the environment later
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub output_dir: PathBuf,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("downloads"),
        }
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Rejected before any work started
    #[error("{0}")]
    InvalidRequest(String),
}

/// Incoming request. `type` is accepted as an alias of `kind`.
/// A missing or `null` url reaches `handle` and is rejected there.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DownloadRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, alias = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub quality: Option<String>,
}

impl DownloadRequest {
    pub fn new(url: &str, kind: &str, quality: &str) -> Self {
        Self {
            url: Some(url.to_string()),
            kind: Some(kind.to_string()),
            quality: Some(quality.to_string()),
        }
    }

    pub fn media_kind(&self) -> MediaKind {
        self.kind.as_deref().map(MediaKind::parse).unwrap_or_default()
    }

    pub fn quality_tier(&self) -> QualityTier {
        self.quality
            .as_deref()
            .map(QualityTier::parse)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_missing_capability_error: Option<bool>,
}

impl DownloadResponse {
    pub fn rejected(error: &GatewayError) -> Self {
        Self {
            success: false,
            message: None,
            title: None,
            path: None,
            error: Some(error.to_string()),
            is_missing_capability_error: None,
        }
    }

    fn from_outcome(outcome: JobOutcome) -> Self {
        match outcome {
            JobOutcome::Succeeded { final_path, title } => Self {
                success: true,
                message: Some(COMPLETED_MESSAGE.to_string()),
                title: Some(title),
                path: Some(final_path.to_string_lossy().replace('\\', "/")),
                error: None,
                is_missing_capability_error: None,
            },
            JobOutcome::Failed { kind, message } => {
                let error = match kind {
                    FailureKind::MissingCapability => MISSING_TRANSCODER_MESSAGE.to_string(),
                    FailureKind::FetchFailed => format!("Download failed: {}", message),
                };
                Self {
                    success: false,
                    message: None,
                    title: None,
                    path: None,
                    error: Some(error),
                    is_missing_capability_error: Some(kind.is_missing_capability()),
                }
            }
        }
    }
}

pub struct RequestGateway {
    config: GatewayConfig,
    probe: Arc<dyn CapabilityProbe>,
    executor: JobExecutor,
}

impl RequestGateway {
    pub fn new(
        config: GatewayConfig,
        probe: Arc<dyn CapabilityProbe>,
        backend: Arc<dyn FetchBackend>,
    ) -> Self {
        Self {
            config,
            probe,
            executor: JobExecutor::new(backend),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Validate, resolve and run one download to completion.
    ///
    /// # Errors
    ///
    /// `GatewayError::InvalidRequest` when the URL is empty after trimming. No
    /// probe runs and no job is created in that case. Execution failures are
    /// not errors here; they come back as an unsuccessful response.
    pub async fn handle(&self, request: DownloadRequest) -> Result<DownloadResponse, GatewayError> {
        let url = request.url.as_deref().unwrap_or_default().trim();
        if url.is_empty() {
            debug!("rejected request without url");
            return Err(GatewayError::InvalidRequest(INVALID_URL_MESSAGE.to_string()));
        }

        let kind = request.media_kind();
        let quality = request.quality_tier();
        let caps = self.probe.probe();
        let policy = FormatSelector::resolve(kind, quality, caps);
        info!(
            url,
            %kind,
            %quality,
            has_transcoder = caps.has_transcoder,
            selector = %policy.selector,
            post_process = ?policy.post_process,
            "resolved format policy"
        );

        let job = AcquisitionJob::new(
            url,
            kind,
            quality,
            caps,
            policy,
            self.config.output_dir.clone(),
        );
        let outcome = self.executor.execute(job).await;
        Ok(DownloadResponse::from_outcome(outcome))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::downloader::orchestrator::tests::FakeBackend;
    use crate::downloader::{Capabilities, PostProcessDirective, PostProcessKind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) struct FixedProbe {
        has_transcoder: bool,
        pub(crate) calls: AtomicUsize,
    }

    impl FixedProbe {
        pub(crate) fn new(has_transcoder: bool) -> Self {
            Self {
                has_transcoder,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl CapabilityProbe for FixedProbe {
        fn probe(&self) -> Capabilities {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Capabilities::new(self.has_transcoder)
        }
    }

    struct Harness {
        _out: tempfile::TempDir,
        probe: Arc<FixedProbe>,
        backend: Arc<FakeBackend>,
        gateway: RequestGateway,
    }

    fn harness(has_transcoder: bool, backend: FakeBackend) -> Harness {
        let out = tempfile::tempdir().unwrap();
        let probe = Arc::new(FixedProbe::new(has_transcoder));
        let backend = Arc::new(backend);
        let gateway = RequestGateway::new(
            GatewayConfig {
                output_dir: out.path().to_path_buf(),
            },
            probe.clone(),
            backend.clone(),
        );
        Harness {
            _out: out,
            probe,
            backend,
            gateway,
        }
    }

    #[tokio::test]
    async fn test_audio_with_transcoder_extracts_mp3() {
        let h = harness(true, FakeBackend::writing("Track", "mp3"));

        let response = h
            .gateway
            .handle(DownloadRequest::new("https://x/valid", "audio", "best"))
            .await
            .unwrap();

        assert!(response.success);
        assert_eq!(response.message.as_deref(), Some(COMPLETED_MESSAGE));
        assert_eq!(response.title.as_deref(), Some("Track"));

        let request = h.backend.last_request.lock().unwrap().clone().unwrap();
        let directive = request.post_process.unwrap();
        assert_eq!(directive.kind, PostProcessKind::ExtractAudio);
        assert_eq!(directive.format, "mp3");
    }

    #[tokio::test]
    async fn test_video_without_transcoder_uses_progressive_selector() {
        let h = harness(false, FakeBackend::writing("Clip", "mp4"));

        let response = h
            .gateway
            .handle(DownloadRequest::new("https://x/valid", "video", "high"))
            .await
            .unwrap();
        assert!(response.success);

        let request = h.backend.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(
            request.selector.expression(),
            "best[ext=mp4][height<=1080][protocol!=dash]/best[ext=mp4]/best"
        );
        assert_eq!(request.post_process, None);
        assert!(!request.prefer_transcoder);
    }

    #[tokio::test]
    async fn test_empty_url_rejected_before_probe() {
        for url in ["", "   ", "\t\n"] {
            let h = harness(true, FakeBackend::writing("x", "mp4"));
            let err = h
                .gateway
                .handle(DownloadRequest::new(url, "best", "best"))
                .await
                .unwrap_err();

            assert!(matches!(err, GatewayError::InvalidRequest(_)));
            assert_eq!(err.to_string(), INVALID_URL_MESSAGE);
            assert_eq!(h.probe.calls.load(Ordering::SeqCst), 0);
            assert_eq!(h.backend.calls.load(Ordering::SeqCst), 0);

            let body = DownloadResponse::rejected(&err);
            assert!(!body.success);
            assert_eq!(body.error.as_deref(), Some(INVALID_URL_MESSAGE));
        }
    }

    #[tokio::test]
    async fn test_ffprobe_failure_flags_missing_capability() {
        let h = harness(true, FakeBackend::failing("ffprobe not found"));

        let response = h
            .gateway
            .handle(DownloadRequest::new("https://x/valid", "video", "best"))
            .await
            .unwrap();

        assert!(!response.success);
        assert_eq!(response.is_missing_capability_error, Some(true));
        assert_eq!(response.error.as_deref(), Some(MISSING_TRANSCODER_MESSAGE));
    }

    #[tokio::test]
    async fn test_fetch_failure_carries_detail() {
        let h = harness(true, FakeBackend::failing("ERROR: Unsupported URL: https://x/valid"));

        let response = h
            .gateway
            .handle(DownloadRequest::new("https://x/valid", "best", "best"))
            .await
            .unwrap();

        assert!(!response.success);
        assert_eq!(response.is_missing_capability_error, Some(false));
        assert_eq!(
            response.error.as_deref(),
            Some("Download failed: ERROR: Unsupported URL: https://x/valid")
        );
        assert_eq!(h.probe.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_defaults_and_trimmed_url() {
        let h = harness(true, FakeBackend::writing("Clip", "mp4"));

        let request = DownloadRequest {
            url: Some("  https://x/valid  ".to_string()),
            kind: None,
            quality: None,
        };
        assert_eq!(request.media_kind(), MediaKind::Best);
        assert_eq!(request.quality_tier(), QualityTier::Best);

        h.gateway.handle(request).await.unwrap();
        let sent = h.backend.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(sent.url, "https://x/valid");
        assert_eq!(sent.selector.expression(), "bestvideo+bestaudio/best");
        assert_eq!(
            sent.post_process,
            Some(PostProcessDirective::convert_container("mp4"))
        );
    }

    #[tokio::test]
    async fn test_null_or_missing_url_rejected() {
        for body in [r#"{"url": null}"#, r#"{"type": "audio"}"#] {
            let h = harness(true, FakeBackend::writing("x", "mp4"));
            let request: DownloadRequest = serde_json::from_str(body).unwrap();

            let err = h.gateway.handle(request).await.unwrap_err();
            assert_eq!(err.to_string(), INVALID_URL_MESSAGE);
            assert_eq!(h.probe.calls.load(Ordering::SeqCst), 0);
        }
    }

    #[test]
    fn test_request_accepts_type_alias() {
        let request: DownloadRequest =
            serde_json::from_str(r#"{"url": "https://x", "type": "audio"}"#).unwrap();
        assert_eq!(request.media_kind(), MediaKind::Audio);
        assert_eq!(request.quality_tier(), QualityTier::Best);
    }

    #[test]
    fn test_failure_response_shape() {
        let body = serde_json::to_value(DownloadResponse::from_outcome(JobOutcome::Failed {
            kind: FailureKind::MissingCapability,
            message: "ffmpeg not found".to_string(),
        }))
        .unwrap();

        assert_eq!(body["success"], false);
        assert_eq!(body["isMissingCapabilityError"], true);
        assert!(body.get("message").is_none());
    }
}
