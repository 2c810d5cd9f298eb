use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

use super::models::Capabilities;
use super::traits::CapabilityProbe;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ToolType {
    YtDlp,
    Ffmpeg,
    Ffprobe,
}

impl ToolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "yt-dlp",
            ToolType::Ffmpeg => "ffmpeg",
            ToolType::Ffprobe => "ffprobe",
        }
    }

    fn version_arg(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "--version",
            // ffmpeg/ffprobe use a single dash
            ToolType::Ffmpeg | ToolType::Ffprobe => "-version",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub tool_type: ToolType,
    pub version: Option<String>,
    pub path: Option<String>,
    pub is_available: bool,
}

/// Where to look for each tool. A value may be a bare name or a path.
#[derive(Debug, Clone)]
pub struct ToolPaths {
    pub ytdlp: Option<String>,
    pub ffmpeg: String,
    pub ffprobe: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ytdlp: None,
            ffmpeg: ToolType::Ffmpeg.as_str().to_string(),
            ffprobe: ToolType::Ffprobe.as_str().to_string(),
        }
    }
}

pub struct ToolManager {
    paths: ToolPaths,
}

impl ToolManager {
    pub fn new(paths: ToolPaths) -> Self {
        Self { paths }
    }

    pub fn get_tool_info(&self, tool_type: ToolType) -> ToolInfo {
        let path = self.locate(tool_type);
        let version = path
            .as_deref()
            .and_then(|p| Self::get_version(p, tool_type));

        ToolInfo {
            name: tool_type.as_str().to_string(),
            tool_type,
            version,
            is_available: path.is_some(),
            path: path.map(|p| p.to_string_lossy().to_string()),
        }
    }

    pub fn get_all_tools(&self) -> Vec<ToolInfo> {
        vec![
            self.get_tool_info(ToolType::YtDlp),
            self.get_tool_info(ToolType::Ffmpeg),
            self.get_tool_info(ToolType::Ffprobe),
        ]
    }

    /// Binary to run for yt-dlp; falls back to the bare name
    pub fn ytdlp_command(&self) -> String {
        self.locate(ToolType::YtDlp)
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|| ToolType::YtDlp.as_str().to_string())
    }

    /// Presence check without spawning the tool
    pub fn is_present(&self, tool_type: ToolType) -> bool {
        self.locate(tool_type).is_some()
    }

    fn configured(&self, tool_type: ToolType) -> &str {
        match tool_type {
            ToolType::YtDlp => self
                .paths
                .ytdlp
                .as_deref()
                .unwrap_or(ToolType::YtDlp.as_str()),
            ToolType::Ffmpeg => self.paths.ffmpeg.as_str(),
            ToolType::Ffprobe => self.paths.ffprobe.as_str(),
        }
    }

    fn locate(&self, tool_type: ToolType) -> Option<PathBuf> {
        let configured = self.configured(tool_type);

        // 1. Explicit path
        let as_path = Path::new(configured);
        if as_path.components().count() > 1 {
            return as_path.is_file().then(|| as_path.to_path_buf());
        }

        // 2. PATH
        if let Ok(found) = which::which(configured) {
            return Some(found);
        }

        // 3. Common install prefixes that may be missing from a service's PATH
        Self::common_dirs()
            .into_iter()
            .map(|dir| dir.join(configured))
            .find(|candidate| candidate.is_file())
    }

    fn common_dirs() -> Vec<PathBuf> {
        let mut candidates = vec![
            PathBuf::from("/opt/homebrew/bin"),
            PathBuf::from("/usr/local/bin"),
            PathBuf::from("/usr/bin"),
        ];
        if let Some(local_bin) = dirs::executable_dir() {
            candidates.push(local_bin);
        }
        candidates
    }

    fn get_version(path: &Path, tool_type: ToolType) -> Option<String> {
        match Command::new(path).arg(tool_type.version_arg()).output() {
            Ok(output) if output.status.success() => {
                // ffmpeg prints a banner; keep the first line only
                let out = String::from_utf8_lossy(&output.stdout);
                out.lines().next().map(|line| line.trim().to_string())
            }
            _ => None,
        }
    }
}

impl Default for ToolManager {
    fn default() -> Self {
        Self::new(ToolPaths::default())
    }
}

impl CapabilityProbe for ToolManager {
    fn probe(&self) -> Capabilities {
        let has_ffmpeg = self.is_present(ToolType::Ffmpeg);
        let has_ffprobe = self.is_present(ToolType::Ffprobe);
        debug!(has_ffmpeg, has_ffprobe, "probed transcoder tools");
        Capabilities::new(has_ffmpeg && has_ffprobe)
    }
}
