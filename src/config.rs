use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use crate::downloader::{NetworkConfig, ToolPaths};
use crate::gateway::GatewayConfig;

/// Command line and environment configuration for the server
#[derive(Debug, Clone, Parser)]
#[command(name = "media-grabber")]
#[command(about = "Download audio or video from a URL through yt-dlp")]
pub struct AppConfig {
    /// Address the web interface listens on
    #[arg(long, env = "GRABBER_BIND", default_value = "0.0.0.0:5000")]
    pub bind: SocketAddr,

    /// Directory finished downloads are written to
    #[arg(short, long, env = "GRABBER_OUTPUT_DIR", default_value = "downloads")]
    pub output_dir: PathBuf,

    /// yt-dlp binary (name or path); searched in PATH when omitted
    #[arg(long, env = "GRABBER_YTDLP")]
    pub ytdlp: Option<String>,

    /// ffmpeg binary (name or path)
    #[arg(long, env = "GRABBER_FFMPEG", default_value = "ffmpeg")]
    pub ffmpeg: String,

    /// ffprobe binary (name or path)
    #[arg(long, env = "GRABBER_FFPROBE", default_value = "ffprobe")]
    pub ffprobe: String,

    /// Deadline for one download in seconds (0 disables it)
    #[arg(long, env = "GRABBER_TIMEOUT_SECS", default_value = "1800")]
    pub timeout_secs: u64,

    /// Socket timeout passed to yt-dlp, in seconds
    #[arg(long, env = "GRABBER_SOCKET_TIMEOUT", default_value = "30")]
    pub socket_timeout: u32,

    /// HTTP or SOCKS5 proxy for yt-dlp
    #[arg(long, env = "GRABBER_PROXY")]
    pub proxy: Option<String>,
}

impl AppConfig {
    pub fn gateway(&self) -> GatewayConfig {
        GatewayConfig {
            output_dir: self.output_dir.clone(),
        }
    }

    pub fn tool_paths(&self) -> ToolPaths {
        ToolPaths {
            ytdlp: self.ytdlp.clone(),
            ffmpeg: self.ffmpeg.clone(),
            ffprobe: self.ffprobe.clone(),
        }
    }

    pub fn network(&self) -> NetworkConfig {
        NetworkConfig {
            proxy: self.proxy.clone().filter(|p| !p.trim().is_empty()),
            timeout: (self.socket_timeout > 0).then_some(self.socket_timeout),
        }
    }

    pub fn fetch_timeout(&self) -> Option<u64> {
        (self.timeout_secs > 0).then_some(self.timeout_secs)
    }
}
