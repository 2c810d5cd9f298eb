use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info};

use crate::downloader::errors::DownloadError;
use crate::downloader::models::{
    FetchRequest, MediaInfo, NetworkConfig, PostProcessDirective, PostProcessKind,
};
use crate::downloader::traits::FetchBackend;
use crate::downloader::utils::{self, run_output_with_timeout};

/// Printed once the file reaches its final name in staging
const METADATA_TEMPLATE: &str = "after_move:%(.{id,title,ext,filepath})j";

/// yt-dlp driven as a child process
pub struct YtDlpBackend {
    ytdlp_bin: String,
    network: NetworkConfig,
    /// Deadline for the whole fetch; `None` waits forever
    timeout_secs: Option<u64>,
}

impl YtDlpBackend {
    pub fn new(ytdlp_bin: impl Into<String>, network: NetworkConfig, timeout_secs: Option<u64>) -> Self {
        Self {
            ytdlp_bin: ytdlp_bin.into(),
            network,
            timeout_secs,
        }
    }

    fn build_args(&self, request: &FetchRequest) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            request.selector.expression(),
            "--no-playlist".to_string(),
            "--newline".to_string(),
            "--progress".to_string(),
            "-o".to_string(),
            request.output_template.clone(),
            "--print".to_string(),
            METADATA_TEMPLATE.to_string(),
        ];

        if let Some(directive) = &request.post_process {
            args.extend(post_process_args(directive));
        }

        // Nothing can run a fixup without ffmpeg; don't let yt-dlp try
        if !request.prefer_transcoder {
            args.push("--fixup".to_string());
            args.push("never".to_string());
        }

        args.extend(utils::get_proxy_args(&self.network));
        args.extend(utils::get_timeout_args(&self.network));

        args.push("--".to_string());
        args.push(request.url.clone());
        args
    }
}

fn post_process_args(directive: &PostProcessDirective) -> Vec<String> {
    match directive.kind {
        PostProcessKind::ExtractAudio => {
            let mut args = vec![
                "-x".to_string(),
                "--audio-format".to_string(),
                directive.format.clone(),
            ];
            if let Some(kbps) = directive.quality {
                args.push("--audio-quality".to_string());
                args.push(format!("{}K", kbps));
            }
            args
        }
        PostProcessKind::ConvertContainer => {
            vec!["--recode-video".to_string(), directive.format.clone()]
        }
    }
}

#[async_trait]
impl FetchBackend for YtDlpBackend {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<MediaInfo, DownloadError> {
        let args = self.build_args(request);
        debug!(bin = %self.ytdlp_bin, ?args, "starting yt-dlp");

        let output = run_output_with_timeout(&self.ytdlp_bin, args, self.timeout_secs).await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stdout.lines().chain(stderr.lines()) {
            if let Some((percent, status)) = parse_ytdlp_progress(line) {
                debug!(percent, "{}", status);
            }
        }

        if !output.status.success() {
            return Err(DownloadError::ExecutionError(error_message(
                &stderr,
                &output.status.to_string(),
            )));
        }

        let media = parse_media_info(&stdout)?;
        info!(title = %media.title, ext = %media.ext, "yt-dlp finished");
        Ok(media)
    }
}

/// Last JSON object yt-dlp printed on stdout
fn parse_media_info(stdout: &str) -> Result<MediaInfo, DownloadError> {
    stdout
        .lines()
        .rev()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .find_map(|line| serde_json::from_str::<MediaInfo>(line).ok())
        .ok_or_else(|| DownloadError::ParseError("yt-dlp printed no metadata".to_string()))
}

/// The ERROR lines from stderr, or all of it when there are none.
/// Warnings are dropped so they cannot skew failure classification.
fn error_message(stderr: &str, status: &str) -> String {
    let errors: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("ERROR:"))
        .collect();

    if !errors.is_empty() {
        return errors.join("\n");
    }

    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        format!("yt-dlp exited with {}", status)
    } else {
        trimmed.to_string()
    }
}

/// Parse yt-dlp progress line like:
/// [download]   6.2% of ~ 343.72MiB at  420.30KiB/s ETA 12:32 (frag 29/454)
/// Returns (percent, status_string)
fn parse_ytdlp_progress(line: &str) -> Option<(f32, String)> {
    lazy_static::lazy_static! {
        static ref PROGRESS_RE: Regex = Regex::new(
            r"\[download\]\s+(\d+\.?\d*)%\s+of\s+~?\s*(\d+\.?\d*\s*\w+)(?:\s+at\s+(\S+))?(?:\s+ETA\s+(\S+))?"
        ).unwrap();
        static ref DEST_RE: Regex = Regex::new(r"\[download\]\s+Destination:\s+(.+)").unwrap();
        static ref MERGE_RE: Regex = Regex::new(r"\[Merger?\]\s+Merging").unwrap();
        static ref CONVERT_RE: Regex = Regex::new(r"\[(ExtractAudio|VideoConvertor)\]").unwrap();
    }

    if let Some(caps) = PROGRESS_RE.captures(line) {
        let percent: f32 = caps.get(1)?.as_str().parse().ok()?;
        let size = caps.get(2).map(|m| m.as_str()).unwrap_or("?");
        let status = match (caps.get(3), caps.get(4)) {
            (Some(speed), Some(eta)) => format!(
                "{:.1}% of {} @ {} ETA {}",
                percent,
                size,
                speed.as_str(),
                eta.as_str()
            ),
            (Some(speed), None) => format!("{:.1}% of {} @ {}", percent, size, speed.as_str()),
            _ => format!("{:.1}% of {}", percent, size),
        };
        return Some((percent, status));
    }

    if let Some(caps) = DEST_RE.captures(line) {
        let filename = caps.get(1).map(|m| m.as_str()).unwrap_or("file");
        let short_name = filename.rsplit('/').next().unwrap_or(filename);
        return Some((0.0, format!("Starting: {}", short_name)));
    }

    if MERGE_RE.is_match(line) {
        return Some((99.0, "Merging video and audio".to_string()));
    }

    if let Some(caps) = CONVERT_RE.captures(line) {
        return Some((99.0, format!("Post-processing ({})", &caps[1])));
    }

    None
}
