//! Web boundary: the download form, the download endpoint and tool status.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::downloader::{CapabilityProbe, ToolInfo, ToolManager};
use crate::gateway::{DownloadRequest, DownloadResponse, GatewayError, RequestGateway};

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<RequestGateway>,
    pub probe: Arc<dyn CapabilityProbe>,
    pub tools: Arc<ToolManager>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/download", post(download))
        .route("/api/tools", get(tools_status))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index(State(state): State<AppState>) -> Html<String> {
    Html(render_index(state.probe.probe().has_transcoder))
}

async fn download(
    State(state): State<AppState>,
    payload: Result<Json<DownloadRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            debug!(status = %rejection.status(), "unreadable download request");
            return rejected(GatewayError::InvalidRequest(rejection.body_text()));
        }
    };

    match state.gateway.handle(request).await {
        Ok(body) if body.success => (StatusCode::OK, Json(body)).into_response(),
        Ok(body) => (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response(),
        Err(err) => rejected(err),
    }
}

fn rejected(err: GatewayError) -> Response {
    (StatusCode::BAD_REQUEST, Json(DownloadResponse::rejected(&err))).into_response()
}

async fn tools_status(State(state): State<AppState>) -> Json<Vec<ToolInfo>> {
    let tools = state.tools.clone();
    // Version checks spawn processes
    let infos = match tokio::task::spawn_blocking(move || tools.get_all_tools()).await {
        Ok(infos) => infos,
        Err(e) => {
            warn!(error = %e, "tool status check failed");
            Vec::new()
        }
    };
    Json(infos)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

fn render_index(has_transcoder: bool) -> String {
    let notice = if has_transcoder {
        ""
    } else {
        r#"<p class="notice">FFmpeg was not found. Audio stays in its original format and video is limited to single-file MP4 up to 1080p.</p>"#
    };
    INDEX_TEMPLATE.replace("{{notice}}", notice)
}

const INDEX_TEMPLATE: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Media Grabber</title>
</head>
<body>
<h1>Media Grabber</h1>
{{notice}}
<form id="download">
  <input name="url" type="url" placeholder="https://..." required>
  <select name="type">
    <option value="best">Best</option>
    <option value="video">Video</option>
    <option value="audio">Audio only</option>
  </select>
  <select name="quality">
    <option value="best">Best</option>
    <option value="high">High (1080p)</option>
    <option value="medium">Medium (720p)</option>
    <option value="low">Low (480p)</option>
  </select>
  <button type="submit">Download</button>
</form>
<p id="result"></p>
<script>
document.getElementById("download").addEventListener("submit", async (event) => {
  event.preventDefault();
  const form = new FormData(event.target);
  const result = document.getElementById("result");
  result.textContent = "Downloading...";
  const response = await fetch("/download", {
    method: "POST",
    headers: { "Content-Type": "application/json" },
    body: JSON.stringify(Object.fromEntries(form)),
  });
  const body = await response.json();
  result.textContent = body.success ? body.message : body.error;
});
</script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::orchestrator::tests::FakeBackend;
    use crate::downloader::ToolPaths;
    use crate::gateway::tests::FixedProbe;
    use crate::gateway::{GatewayConfig, INVALID_URL_MESSAGE};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn app(out: &std::path::Path, has_transcoder: bool, backend: FakeBackend) -> Router {
        let probe: Arc<dyn CapabilityProbe> = Arc::new(FixedProbe::new(has_transcoder));
        let gateway = RequestGateway::new(
            GatewayConfig {
                output_dir: out.to_path_buf(),
            },
            probe.clone(),
            Arc::new(backend),
        );
        router(AppState {
            gateway: Arc::new(gateway),
            probe,
            tools: Arc::new(ToolManager::new(ToolPaths {
                ytdlp: Some("/nonexistent/yt-dlp".to_string()),
                ffmpeg: "/nonexistent/ffmpeg".to_string(),
                ffprobe: "/nonexistent/ffprobe".to_string(),
            })),
        })
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn post_json(app: Router, body: &str) -> (StatusCode, serde_json::Value) {
        send(
            app,
            Request::post("/download")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    #[tokio::test]
    async fn test_download_success() {
        let out = tempfile::tempdir().unwrap();
        let (status, body) = post_json(
            app(out.path(), true, FakeBackend::writing("Song", "mp3")),
            r#"{"url": "https://x/valid", "type": "audio", "quality": "best"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Download completed successfully!");
        assert!(out.path().join("Song.mp3").is_file());
    }

    #[tokio::test]
    async fn test_empty_url_is_client_error() {
        let out = tempfile::tempdir().unwrap();
        let (status, body) = post_json(
            app(out.path(), true, FakeBackend::writing("x", "mp4")),
            r#"{"url": "", "type": "best"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], INVALID_URL_MESSAGE);
    }

    #[tokio::test]
    async fn test_null_url_is_client_error() {
        let out = tempfile::tempdir().unwrap();
        let backend = FakeBackend::writing("x", "mp4");
        let (status, body) = post_json(app(out.path(), true, backend), r#"{"url": null}"#).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], INVALID_URL_MESSAGE);
    }

    #[tokio::test]
    async fn test_unreadable_body_gets_json_error() {
        let out = tempfile::tempdir().unwrap();

        let (status, body) =
            post_json(app(out.path(), true, FakeBackend::writing("x", "mp4")), "not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));

        let (status, body) = send(
            app(out.path(), true, FakeBackend::writing("x", "mp4")),
            Request::post("/download")
                .body(Body::from(r#"{"url": "https://x/valid"}"#))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_missing_capability_is_flagged() {
        let out = tempfile::tempdir().unwrap();
        let (status, body) = post_json(
            app(out.path(), true, FakeBackend::failing("ffprobe not found")),
            r#"{"url": "https://x/valid"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["isMissingCapabilityError"], true);
    }

    #[tokio::test]
    async fn test_index_mentions_missing_ffmpeg() {
        let out = tempfile::tempdir().unwrap();
        let response = app(out.path(), false, FakeBackend::writing("x", "mp4"))
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("FFmpeg was not found"));
        assert!(!html.contains("{{notice}}"));
    }

    #[tokio::test]
    async fn test_tools_status_lists_all_tools() {
        let out = tempfile::tempdir().unwrap();
        let response = app(out.path(), false, FakeBackend::writing("x", "mp4"))
            .oneshot(Request::get("/api/tools").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let tools: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let names: Vec<&str> = tools
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["yt-dlp", "ffmpeg", "ffprobe"]);
        assert!(tools[0]["is_available"] == false);
    }
}
