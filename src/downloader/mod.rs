// Downloader module - policy resolution, job execution and the yt-dlp backend

pub mod backends;
pub mod errors;
pub mod format_selector;
pub mod models;
pub mod orchestrator;
pub mod tools;
pub mod traits;
pub mod utils;

pub use backends::YtDlpBackend;
pub use errors::{DownloadError, FailureKind};
pub use format_selector::FormatSelector;
pub use models::{
    AcquisitionJob, Capabilities, FetchRequest, FormatPolicy, JobOutcome, JobStatus, MediaInfo,
    MediaKind, NetworkConfig, PostProcessDirective, PostProcessKind, QualityTier, StreamSelector,
    staging_root,
};
pub use orchestrator::JobExecutor;
pub use tools::{ToolInfo, ToolManager, ToolPaths, ToolType};
pub use traits::{CapabilityProbe, FetchBackend};
