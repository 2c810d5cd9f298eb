// Job executor: one fetch attempt per job, staged output, classified failure

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::errors::{DownloadError, FailureKind};
use super::models::{AcquisitionJob, FetchRequest, JobOutcome, JobStatus, MediaInfo};
use super::traits::FetchBackend;
use super::utils;

/// Removes a staging directory when the job future is dropped mid-flight.
/// The normal path disarms it and cleans up asynchronously.
struct StagingGuard {
    dir: PathBuf,
    armed: bool,
}

impl StagingGuard {
    fn new(dir: PathBuf) -> Self {
        Self { dir, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for StagingGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => debug!(dir = %self.dir.display(), "removed staging of cancelled job"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(dir = %self.dir.display(), error = %e, "failed to remove staging of cancelled job"),
        }
    }
}

pub struct JobExecutor {
    backend: Arc<dyn FetchBackend>,
}

impl JobExecutor {
    pub fn new(backend: Arc<dyn FetchBackend>) -> Self {
        Self { backend }
    }

    /// Run the job to a terminal state. No retries.
    ///
    /// The backend writes into the job's staging directory. Only a finished
    /// artifact is moved into the output directory; on any failure the staging
    /// directory is removed with whatever partial files it holds.
    pub async fn execute(&self, mut job: AcquisitionJob) -> JobOutcome {
        job.status = JobStatus::Running;
        info!(
            job_id = %job.id,
            url = %job.url,
            kind = %job.kind,
            quality = %job.quality,
            backend = self.backend.name(),
            selector = %job.policy.selector,
            "job started"
        );

        let staging = job.staging_dir();
        let mut guard = StagingGuard::new(staging.clone());
        let result = self.run(&job, &staging).await;
        utils::discard_staging(&staging).await;
        guard.disarm();

        let outcome = match result {
            Ok((final_path, media)) => JobOutcome::Succeeded {
                final_path,
                title: media.title,
            },
            Err(error) => {
                let message = error.to_string();
                JobOutcome::Failed {
                    kind: FailureKind::classify(&message),
                    message,
                }
            }
        };

        job.status = outcome.status();
        match &outcome {
            JobOutcome::Succeeded { final_path, title } => info!(
                job_id = %job.id,
                path = %final_path.display(),
                title = %title,
                "job succeeded"
            ),
            JobOutcome::Failed { kind, message } => warn!(
                job_id = %job.id,
                ?kind,
                error = %message,
                "job failed"
            ),
        }
        outcome
    }

    async fn run(
        &self,
        job: &AcquisitionJob,
        staging: &Path,
    ) -> Result<(PathBuf, MediaInfo), DownloadError> {
        utils::ensure_dir(staging).await?;

        let request = FetchRequest {
            url: job.url.clone(),
            selector: job.policy.selector.clone(),
            post_process: job.policy.post_process.clone(),
            output_template: utils::output_template(staging),
            prefer_transcoder: job.capabilities.has_transcoder,
        };

        let media = self.backend.fetch(&request).await?;

        // Trust the reported path only if it points into this job's staging area
        let mut reported = None;
        if let Some(path) = media.filepath.as_ref().filter(|p| p.starts_with(staging)) {
            if utils::is_file(path).await {
                reported = Some(path);
            }
        }
        let artifact = match reported {
            Some(path) => path.clone(),
            None => utils::find_artifact(staging).await?.ok_or_else(|| {
                DownloadError::ExecutionError(format!(
                    "{} reported success but produced no file",
                    self.backend.name()
                ))
            })?,
        };

        let final_path = utils::publish_artifact(&artifact, &job.output_dir).await?;
        Ok((final_path, media))
    }
}
