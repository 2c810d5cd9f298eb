// Seams between the engine and the host: tool detection and the fetch backend

use async_trait::async_trait;

use super::errors::DownloadError;
use super::models::{Capabilities, FetchRequest, MediaInfo};

/// Read-only view of which tools the host offers
pub trait CapabilityProbe: Send + Sync {
    /// Never fails: a missing tool is just `false`
    fn probe(&self) -> Capabilities;
}

/// External fetch/transcode capability (yt-dlp in production)
#[async_trait]
pub trait FetchBackend: Send + Sync {
    /// Name of the backend (for logging)
    fn name(&self) -> &'static str;

    /// Fetch, and post-process if asked, in a single blocking attempt.
    /// Errors carry the tool's own message text.
    async fn fetch(&self, request: &FetchRequest) -> Result<MediaInfo, DownloadError>;
}
