// Common data models for the acquisition engine

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::FailureKind;

/// What the user wants out of the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
    /// Unspecified: take the best available
    #[default]
    Best,
}

impl MediaKind {
    /// Parse a request value. Unknown values mean "best".
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "audio" => Self::Audio,
            "video" => Self::Video,
            _ => Self::Best,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Best => "best",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Video quality ceiling. Ignored unless the kind is `Video`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    #[default]
    Best,
    /// Up to 1080p
    High,
    /// Up to 720p
    Medium,
    /// Up to 480p
    Low,
}

impl QualityTier {
    /// Parse a request value. Unknown values fall back to `Best`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "high" => Self::High,
            "medium" => Self::Medium,
            "low" => Self::Low,
            _ => Self::Best,
        }
    }

    /// Height cap in pixels, if any
    pub fn max_height(&self) -> Option<u32> {
        match self {
            Self::Best => None,
            Self::High => Some(1080),
            Self::Medium => Some(720),
            Self::Low => Some(480),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Best => "best",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of what the host can do, taken once per request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    /// Both ffmpeg and ffprobe are present
    pub has_transcoder: bool,
}

impl Capabilities {
    pub fn new(has_transcoder: bool) -> Self {
        Self { has_transcoder }
    }
}

/// Ordered fallback expressions, tried left to right by yt-dlp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSelector {
    alternatives: Vec<String>,
}

impl StreamSelector {
    pub fn new<I, S>(alternatives: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            alternatives: alternatives.into_iter().map(Into::into).collect(),
        }
    }

    pub fn alternatives(&self) -> &[String] {
        &self.alternatives
    }

    /// yt-dlp `-f` argument
    pub fn expression(&self) -> String {
        self.alternatives.join("/")
    }
}

impl fmt::Display for StreamSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostProcessKind {
    ExtractAudio,
    ConvertContainer,
}

/// Conversion to run after the fetch. Requires a transcoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostProcessDirective {
    pub kind: PostProcessKind,
    /// Target codec or container (e.g. "mp3", "mp4")
    pub format: String,
    /// Target bitrate in kbps, audio only
    pub quality: Option<u32>,
}

impl PostProcessDirective {
    pub fn extract_audio(format: &str, kbps: u32) -> Self {
        Self {
            kind: PostProcessKind::ExtractAudio,
            format: format.to_string(),
            quality: Some(kbps),
        }
    }

    pub fn convert_container(format: &str) -> Self {
        Self {
            kind: PostProcessKind::ConvertContainer,
            format: format.to_string(),
            quality: None,
        }
    }
}

/// Resolved policy: what to fetch and what to do with it afterwards
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatPolicy {
    pub selector: StreamSelector,
    pub post_process: Option<PostProcessDirective>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// One download request, from creation to a terminal status
#[derive(Debug, Clone)]
pub struct AcquisitionJob {
    pub id: Uuid,
    pub url: String,
    pub kind: MediaKind,
    pub quality: QualityTier,
    pub capabilities: Capabilities,
    pub policy: FormatPolicy,
    /// Directory the artifact is published into
    pub output_dir: PathBuf,
    pub status: JobStatus,
}

impl AcquisitionJob {
    pub fn new(
        url: &str,
        kind: MediaKind,
        quality: QualityTier,
        capabilities: Capabilities,
        policy: FormatPolicy,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: url.to_string(),
            kind,
            quality,
            capabilities,
            policy,
            output_dir,
            status: JobStatus::Pending,
        }
    }

    /// Per-job scratch directory; partial files never leave it
    pub fn staging_dir(&self) -> PathBuf {
        staging_root(&self.output_dir).join(self.id.to_string())
    }
}

/// Directory under the output dir holding every job's staging directory
pub fn staging_root(output_dir: &Path) -> PathBuf {
    output_dir.join(".jobs")
}

/// Typed option set handed to the fetch backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub selector: StreamSelector,
    pub post_process: Option<PostProcessDirective>,
    /// yt-dlp output template, always with `/` separators
    pub output_template: String,
    /// Whether a transcoder may be used for fixups and merges
    pub prefer_transcoder: bool,
}

/// Metadata returned by the backend after a successful fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default = "unknown_title")]
    pub title: String,
    #[serde(default)]
    pub ext: String,
    /// Where the backend left the file, if it said so
    #[serde(default)]
    pub filepath: Option<PathBuf>,
}

fn unknown_title() -> String {
    "Unknown".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded { final_path: PathBuf, title: String },
    Failed { kind: FailureKind, message: String },
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    pub fn status(&self) -> JobStatus {
        match self {
            Self::Succeeded { .. } => JobStatus::Succeeded,
            Self::Failed { .. } => JobStatus::Failed,
        }
    }
}

/// Network configuration for the backend
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// HTTP or SOCKS5 proxy URL (e.g., "socks5://127.0.0.1:1080")
    pub proxy: Option<String>,

    /// Socket timeout in seconds
    pub timeout: Option<u32>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            timeout: Some(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        assert_eq!(MediaKind::parse("audio"), MediaKind::Audio);
        assert_eq!(MediaKind::parse(" Video "), MediaKind::Video);
        assert_eq!(MediaKind::parse("best"), MediaKind::Best);
        assert_eq!(MediaKind::parse("playlist"), MediaKind::Best);
    }

    #[test]
    fn test_quality_parsing_falls_back_to_best() {
        assert_eq!(QualityTier::parse("high"), QualityTier::High);
        assert_eq!(QualityTier::parse("MEDIUM"), QualityTier::Medium);
        assert_eq!(QualityTier::parse("low"), QualityTier::Low);
        assert_eq!(QualityTier::parse("4k"), QualityTier::Best);
        assert_eq!(QualityTier::parse(""), QualityTier::Best);
    }

    #[test]
    fn test_selector_expression() {
        let selector = StreamSelector::new(["bestvideo+bestaudio", "best"]);
        assert_eq!(selector.expression(), "bestvideo+bestaudio/best");
        assert_eq!(selector.alternatives().len(), 2);
    }

    #[test]
    fn test_media_info_defaults() {
        let info: MediaInfo = serde_json::from_str(r#"{"ext": "mp4"}"#).unwrap();
        assert_eq!(info.title, "Unknown");
        assert!(info.filepath.is_none());
    }

    #[test]
    fn test_staging_dir_is_per_job() {
        let policy = FormatPolicy {
            selector: StreamSelector::new(["best"]),
            post_process: None,
        };
        let a = AcquisitionJob::new(
            "https://x/a",
            MediaKind::Best,
            QualityTier::Best,
            Capabilities::default(),
            policy.clone(),
            PathBuf::from("downloads"),
        );
        let b = AcquisitionJob::new(
            "https://x/b",
            MediaKind::Best,
            QualityTier::Best,
            Capabilities::default(),
            policy,
            PathBuf::from("downloads"),
        );
        assert_ne!(a.staging_dir(), b.staging_dir());
        assert!(a.staging_dir().starts_with("downloads/.jobs"));
        assert_eq!(a.status, JobStatus::Pending);
    }
}
