// Helper functions for backend implementations and job staging

use crate::downloader::errors::DownloadError;
use crate::downloader::models::NetworkConfig;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;
use tokio::time::{timeout, Duration as TokioDuration};
use tracing::{debug, warn};

/// File name pattern yt-dlp fills in with the media title and extension
pub const OUTPUT_FILE_PATTERN: &str = "%(title)s.%(ext)s";

/// Run command, optionally under a deadline (shared utility)
pub async fn run_output_with_timeout(
    program: &str,
    args: Vec<String>,
    timeout_secs: Option<u64>,
) -> Result<std::process::Output, DownloadError> {
    let mut child = TokioCommand::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| DownloadError::ToolNotFound(format!("{}: {}", program, e)))?;

    let mut stdout_pipe = child.stdout.take().ok_or_else(|| {
        DownloadError::ExecutionError(format!("Failed to capture stdout from {}", program))
    })?;
    let mut stderr_pipe = child.stderr.take().ok_or_else(|| {
        DownloadError::ExecutionError(format!("Failed to capture stderr from {}", program))
    })?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });

    let waited = match timeout_secs {
        Some(secs) => match timeout(TokioDuration::from_secs(secs), child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                warn!(program, secs, "process exceeded deadline, killing");
                let _ = child.kill().await;
                stdout_task.abort();
                stderr_task.abort();
                return Err(DownloadError::Timeout(secs));
            }
        },
        None => child.wait().await,
    };

    let status = waited?;
    let stdout = join_pipe(stdout_task, "stdout").await?;
    let stderr = join_pipe(stderr_task, "stderr").await?;
    Ok(std::process::Output {
        status,
        stdout,
        stderr,
    })
}

async fn join_pipe(
    task: tokio::task::JoinHandle<std::io::Result<Vec<u8>>>,
    name: &str,
) -> Result<Vec<u8>, DownloadError> {
    task.await
        .map_err(|e| DownloadError::ExecutionError(format!("{} task failed: {}", name, e)))?
        .map_err(DownloadError::from)
}

/// Output template inside `dir`, with `/` separators on every host
pub fn output_template(dir: &Path) -> String {
    normalize_separators(&dir.join(OUTPUT_FILE_PATTERN).to_string_lossy())
}

pub fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

/// Create the output directory if needed (idempotent)
pub async fn ensure_dir(dir: &Path) -> Result<(), DownloadError> {
    tokio::fs::create_dir_all(dir).await?;
    Ok(())
}

/// Candidate names for `file_name` in `dir`: "name.ext", "name (1).ext", ...
fn destination_candidates<'a>(dir: &'a Path, file_name: &'a str) -> impl Iterator<Item = PathBuf> + 'a {
    let (stem, ext) = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (file_name, None),
    };

    std::iter::once(dir.join(file_name)).chain((1u32..).map(move |n| match ext {
        Some(ext) => dir.join(format!("{} ({}).{}", stem, n, ext)),
        None => dir.join(format!("{} ({})", stem, n)),
    }))
}

/// Claim the first free name for `file_name` in `dir` by creating it empty.
/// `create_new` makes the claim atomic, so concurrent jobs never share a name.
pub async fn reserve_destination(dir: &Path, file_name: &str) -> Result<PathBuf, DownloadError> {
    for candidate in destination_candidates(dir, file_name) {
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
            .await
        {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(DownloadError::ExecutionError(format!(
        "No free file name for {} in {}",
        file_name,
        dir.display()
    )))
}

/// Move a finished artifact out of staging into `dest_dir`
pub async fn publish_artifact(artifact: &Path, dest_dir: &Path) -> Result<PathBuf, DownloadError> {
    let file_name = artifact
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| {
            DownloadError::ParseError(format!("No file name in {}", artifact.display()))
        })?;

    // The rename replaces only the placeholder this job reserved
    let destination = reserve_destination(dest_dir, &file_name).await?;
    if let Err(e) = tokio::fs::rename(artifact, &destination).await {
        let _ = tokio::fs::remove_file(&destination).await;
        return Err(e.into());
    }
    debug!(from = %artifact.display(), to = %destination.display(), "published artifact");
    Ok(destination)
}

/// Non-blocking regular-file check
pub async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Find the single finished file left in a staging directory.
/// yt-dlp scratch files (.part, .ytdl, .temp) are skipped.
pub async fn find_artifact(staging: &Path) -> Result<Option<PathBuf>, DownloadError> {
    let mut entries = tokio::fs::read_dir(staging).await?;
    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if is_scratch_file(&name) {
            continue;
        }
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified().unwrap_or(std::time::UNIX_EPOCH);
        if newest.as_ref().map_or(true, |(t, _)| modified > *t) {
            newest = Some((modified, path));
        }
    }

    Ok(newest.map(|(_, path)| path))
}

fn is_scratch_file(name: &str) -> bool {
    [".part", ".ytdl", ".temp", ".tmp"]
        .iter()
        .any(|suffix| name.ends_with(suffix))
        || name.contains(".part-Frag")
}

/// Remove a job's staging directory and whatever partial output it holds
pub async fn discard_staging(staging: &Path) {
    match tokio::fs::remove_dir_all(staging).await {
        Ok(()) => debug!(dir = %staging.display(), "removed staging directory"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(dir = %staging.display(), error = %e, "failed to remove staging directory"),
    }
}

/// Remove every staging directory left under `jobs_root`.
///
/// Only safe while no job is running, i.e. at startup. Returns how many
/// entries were removed.
pub async fn sweep_staging(jobs_root: &Path) -> usize {
    let mut entries = match tokio::fs::read_dir(jobs_root).await {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(dir = %jobs_root.display(), error = %e, "cannot open staging root");
            }
            return 0;
        }
    };

    let mut removed = 0;
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!(dir = %jobs_root.display(), error = %e, "cannot list staging root");
                break;
            }
        };

        let path = entry.path();
        let result = match entry.file_type().await {
            Ok(t) if t.is_dir() => tokio::fs::remove_dir_all(&path).await,
            _ => tokio::fs::remove_file(&path).await,
        };
        match result {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove stale staging entry"),
        }
    }
    removed
}

/// Build proxy arguments for yt-dlp
pub fn get_proxy_args(config: &NetworkConfig) -> Vec<String> {
    let mut args = Vec::new();

    if let Some(proxy) = &config.proxy {
        args.push("--proxy".to_string());
        args.push(proxy.clone());
    }

    args
}

/// Build timeout arguments for yt-dlp
pub fn get_timeout_args(config: &NetworkConfig) -> Vec<String> {
    let mut args = Vec::new();

    if let Some(timeout) = config.timeout {
        args.push("--socket-timeout".to_string());
        args.push(timeout.to_string());
    }

    args
}
