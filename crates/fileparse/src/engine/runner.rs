use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;

use log::{debug, error, info, warn};

use crate::broadcast::JobProgressBroadcaster;
use crate::engine::{EngineSettings, InFlight};
use crate::error::ExtractError;
use crate::extractor::{ExtractorRegistry, ProgressReporter, START_PROGRESS};
use crate::jobs::{JobRecord, JobStatus, ParsedContent};
use crate::repo::{RecordRepository, RepositoryError};
use crate::sanitize::redact_path;
use crate::worker::{Job, JobHandler};

/// Drives one job from dequeue to its terminal state.
pub struct JobRunner {
    repo: Arc<dyn RecordRepository>,
    registry: Arc<ExtractorRegistry>,
    broadcaster: JobProgressBroadcaster,
    inflight: Arc<InFlight>,
    settings: EngineSettings,
}

impl JobRunner {
    pub fn new(
        repo: Arc<dyn RecordRepository>,
        registry: Arc<ExtractorRegistry>,
        broadcaster: JobProgressBroadcaster,
        inflight: Arc<InFlight>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            repo,
            registry,
            broadcaster,
            inflight,
            settings,
        }
    }

    pub fn run(&self, job_id: &str, cancel: &AtomicBool) {
        let _span = tracing::info_span!("job", id = job_id).entered();

        let mut record = match self.repo.fetch(job_id) {
            Ok(Some(record)) => record,
            Ok(None) => {
                info!("Job {} was deleted before processing started", job_id);
                return;
            }
            Err(e) => {
                error!("Failed to load job {}: {}", job_id, e);
                return;
            }
        };

        if record.is_terminal() {
            debug!("Job {} is already {}, skipping", job_id, record.status);
            return;
        }

        if record.status == JobStatus::Uploading {
            match self
                .repo
                .update(job_id, &mut |r: &mut JobRecord| r.begin_processing())
            {
                Ok(updated) => {
                    self.broadcaster.publish(&updated, "Processing started");
                    record = updated;
                }
                Err(RepositoryError::NotFound(_)) => {
                    info!("Job {} was deleted before processing started", job_id);
                    return;
                }
                Err(e) => {
                    self.finish(&record, Err(format!("could not start processing: {}", e)));
                    return;
                }
            }
        }

        info!(
            "Processing job {} ({})",
            job_id,
            redact_path(&record.storage_location)
        );

        let progress = super::RepositoryProgress::new(
            self.repo.as_ref(),
            &self.broadcaster,
            &record,
            cancel,
            self.settings.job_timeout,
        );
        progress.report(START_PROGRESS);

        let outcome = self.extract(&record, &progress).map_err(|e| {
            error!(
                "Extraction failed for job {} [{}]: {}",
                job_id,
                e.kind(),
                e
            );
            e.to_string()
        });

        self.finish(&record, outcome);
    }

    fn extract(
        &self,
        record: &JobRecord,
        progress: &dyn ProgressReporter,
    ) -> Result<ParsedContent, ExtractError> {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.registry
                .extract(&record.filename, &record.storage_location, progress)
        }));

        match result {
            Ok(outcome) => outcome,
            Err(payload) => Err(ExtractError::Panicked {
                message: panic_message(payload.as_ref()),
            }),
        }
    }

    /// Writes the terminal state, retrying transient repository failures.
    fn finish(&self, record: &JobRecord, outcome: Result<ParsedContent, String>) {
        let job_id = record.id.as_str();
        let attempts = self.settings.terminal_write_attempts.max(1);

        for attempt in 1..=attempts {
            let written = self
                .repo
                .update(job_id, &mut |r: &mut JobRecord| match &outcome {
                    Ok(content) => r.complete(content.clone()),
                    Err(reason) => r.fail(reason.clone()),
                });

            match written {
                Ok(updated) => {
                    match updated.status {
                        JobStatus::Ready => {
                            info!("Job {} ready", job_id);
                            self.broadcaster.publish(&updated, "Processing completed");
                        }
                        _ => {
                            info!("Job {} failed", job_id);
                            self.broadcaster.publish(&updated, "Processing failed");
                        }
                    }
                    return;
                }
                Err(RepositoryError::NotFound(_)) => {
                    debug!("Job {} was deleted during processing, discarding result", job_id);
                    return;
                }
                Err(RepositoryError::Rejected(e)) => {
                    debug!("Discarding result for job {}: {}", job_id, e);
                    return;
                }
                Err(e) if attempt < attempts => {
                    warn!(
                        "Terminal write for job {} failed (attempt {}/{}): {}",
                        job_id, attempt, attempts, e
                    );
                    thread::sleep(self.settings.retry_backoff * attempt);
                }
                Err(e) => {
                    error!(
                        "Hard failure: could not record final state of job {} after {} attempts: {}",
                        job_id, attempts, e
                    );
                }
            }
        }
    }
}

impl JobHandler for JobRunner {
    fn handle(&self, job: &Job) {
        self.run(&job.id, &job.cancel);
    }

    fn finished(&self, job: &Job) {
        self.inflight.release(&job.id);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
