// Error types for the fetch backend and job failure classification

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    /// yt-dlp (or another required binary) could not be started
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// The external call exceeded the configured deadline
    #[error("Timed out after {0}s")]
    Timeout(u64),

    /// yt-dlp ran but exited unsuccessfully; carries its stderr
    #[error("{0}")]
    ExecutionError(String),

    /// Failed to parse the metadata yt-dlp printed
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Staging or moving the artifact on disk failed
    #[error("File error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a job ended without an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// The transcoder or prober is missing or broken
    MissingCapability,
    /// Anything else: network, unsupported URL, disk, timeout
    FetchFailed,
}

impl FailureKind {
    /// Classify a free-text failure message.
    ///
    /// yt-dlp has no structured error taxonomy, so the message text is the only
    /// signal available. Any mention of `ffmpeg` or `ffprobe`, in any case, points
    /// at the transcoder; everything else is a fetch failure.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("ffmpeg") || lower.contains("ffprobe") {
            Self::MissingCapability
        } else {
            Self::FetchFailed
        }
    }

    pub fn is_missing_capability(&self) -> bool {
        matches!(self, Self::MissingCapability)
    }
}

impl From<&DownloadError> for FailureKind {
    fn from(error: &DownloadError) -> Self {
        Self::classify(&error.to_string())
    }
}
