//! Job engine: owns the job state machine and runs extractions on a fixed
//! pool of worker threads.
//!
//! Request handlers call into the engine to register uploads, submit them
//! for processing and query their state. Workers write progress and the
//! final result back through the [`RecordRepository`]; every write is a
//! transition on [`JobRecord`] so illegal moves are rejected at the source.

mod inflight;
mod progress;
mod runner;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast;

use crate::broadcast::{JobProgressBroadcaster, JobProgressEvent};
use crate::config::EngineConfig;
use crate::error::StorageError;
use crate::extractor::{ExtractorRegistry, DEFAULT_BATCH_SIZE};
use crate::jobs::{JobOutput, JobProgress, JobRecord, JobStatus, JobSummary};
use crate::repo::{RecordRepository, RepositoryError};
use crate::storage::UploadStorage;
use crate::worker::{Job, WorkerPool};

pub use inflight::InFlight;
pub use progress::RepositoryProgress;
pub use runner::JobRunner;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job {id} is not ready (status: {status})")]
    NotReady { id: String, status: JobStatus },

    #[error("Repository error: {0}")]
    Repository(RepositoryError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Job engine is shutting down")]
    ShuttingDown,
}

impl From<RepositoryError> for EngineError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound(id) => EngineError::NotFound(id),
            other => EngineError::Repository(other),
        }
    }
}

/// Outcome of [`JobEngine::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Accepted for background processing.
    Queued,
    /// No record with that id exists.
    UnknownJob,
    /// The job is already queued or running.
    AlreadyQueued,
    /// The job already finished; nothing to do.
    Terminal,
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub workers: usize,
    /// Rows per progress tick for tabular extraction.
    pub batch_size: usize,
    /// Cooperative per-job time limit.
    pub job_timeout: Option<Duration>,
    pub terminal_write_attempts: u32,
    /// Base delay between terminal write attempts; grows linearly.
    pub retry_backoff: Duration,
    pub event_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            workers: num_cpus::get().max(1),
            batch_size: DEFAULT_BATCH_SIZE,
            job_timeout: None,
            terminal_write_attempts: 3,
            retry_backoff: Duration::from_millis(50),
            event_capacity: 256,
        }
    }
}

impl From<&EngineConfig> for EngineSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            workers: config.workers,
            batch_size: config.batch_size,
            job_timeout: config.job_timeout_secs.map(Duration::from_secs),
            terminal_write_attempts: config.terminal_write_attempts,
            ..Self::default()
        }
    }
}

pub struct JobEngine {
    repo: Arc<dyn RecordRepository>,
    storage: Arc<UploadStorage>,
    broadcaster: JobProgressBroadcaster,
    inflight: Arc<InFlight>,
    pool: WorkerPool,
}

impl JobEngine {
    /// Engine with the built-in extractors.
    pub fn new(
        repo: Arc<dyn RecordRepository>,
        storage: Arc<UploadStorage>,
        settings: EngineSettings,
    ) -> Self {
        let registry = ExtractorRegistry::new(settings.batch_size);
        Self::with_registry(repo, storage, settings, registry)
    }

    pub fn with_registry(
        repo: Arc<dyn RecordRepository>,
        storage: Arc<UploadStorage>,
        settings: EngineSettings,
        registry: ExtractorRegistry,
    ) -> Self {
        let broadcaster = JobProgressBroadcaster::new(settings.event_capacity);
        let inflight = Arc::new(InFlight::new());
        let workers = settings.workers;

        let runner = Arc::new(JobRunner::new(
            Arc::clone(&repo),
            Arc::new(registry),
            broadcaster.clone(),
            Arc::clone(&inflight),
            settings,
        ));
        let pool = WorkerPool::new(workers, runner);

        log::info!(
            "Job engine started with {} workers on the {} repository",
            pool.worker_count(),
            repo.name()
        );

        Self {
            repo,
            storage,
            broadcaster,
            inflight,
            pool,
        }
    }

    pub fn storage(&self) -> &UploadStorage {
        &self.storage
    }

    pub fn repository(&self) -> &Arc<dyn RecordRepository> {
        &self.repo
    }

    /// Registers a new upload in the `uploading` state.
    ///
    /// The id is freshly generated and the storage location derived from it.
    pub fn create(&self, filename: &str) -> Result<JobRecord, EngineError> {
        let id = uuid::Uuid::new_v4().to_string();
        let location = self.storage.location_for(&id, filename);
        self.create_at(&id, filename, &location)
    }

    /// Registers a record with a caller-chosen id and location.
    pub fn create_at(
        &self,
        id: &str,
        filename: &str,
        location: &Path,
    ) -> Result<JobRecord, EngineError> {
        if self.pool.is_shutdown() {
            return Err(EngineError::ShuttingDown);
        }
        let record = JobRecord::new(id, filename, location);
        self.repo.create(&record)?;
        log::info!("Created job {} for '{}'", record.id, record.filename);
        self.broadcaster.publish(&record, "Upload started");
        Ok(record)
    }

    /// `uploading -> processing`, once the bytes are fully persisted.
    pub fn begin_processing(&self, job_id: &str) -> Result<JobRecord, EngineError> {
        let record = self
            .repo
            .update(job_id, &mut |r: &mut JobRecord| r.begin_processing())?;
        self.broadcaster.publish(&record, "Upload complete");
        Ok(record)
    }

    /// Fails a job before it was handed to a worker.
    pub fn fail(&self, job_id: &str, reason: &str) -> Result<JobRecord, EngineError> {
        let record = self
            .repo
            .update(job_id, &mut |r: &mut JobRecord| r.fail(reason))?;
        log::error!("Job {} failed: {}", job_id, reason);
        self.broadcaster.publish(&record, "Processing failed");
        Ok(record)
    }

    /// Schedules background processing. Never blocks on the queue.
    pub fn submit(&self, job_id: &str) -> Result<Submission, EngineError> {
        let record = match self.repo.fetch(job_id)? {
            Some(record) => record,
            None => {
                log::warn!("Ignoring submit for unknown job {}", job_id);
                return Ok(Submission::UnknownJob);
            }
        };
        if record.is_terminal() {
            log::debug!("Ignoring submit for {} job {}", record.status, job_id);
            return Ok(Submission::Terminal);
        }

        let cancel = match self.inflight.try_claim(job_id) {
            Some(flag) => flag,
            None => {
                log::debug!("Job {} is already queued", job_id);
                return Ok(Submission::AlreadyQueued);
            }
        };

        if self.pool.submit(Job::new(job_id, cancel)).is_err() {
            self.inflight.release(job_id);
            return Err(EngineError::ShuttingDown);
        }
        log::debug!("Queued job {}", job_id);
        Ok(Submission::Queued)
    }

    pub fn get_status(&self, job_id: &str) -> Result<JobProgress, EngineError> {
        self.fetch(job_id).map(|r| r.progress_view())
    }

    pub fn get_result(&self, job_id: &str) -> Result<JobOutput, EngineError> {
        let record = self.fetch(job_id)?;
        if record.status != JobStatus::Ready {
            return Err(EngineError::NotReady {
                id: record.id,
                status: record.status,
            });
        }
        let parsed_content = record.parsed_content.ok_or_else(|| {
            EngineError::Repository(RepositoryError::Corrupt {
                id: record.id.clone(),
                reason: "ready job without parsed content".to_string(),
            })
        })?;
        Ok(JobOutput {
            id: record.id,
            filename: record.filename,
            parsed_content,
        })
    }

    pub fn list(&self) -> Result<Vec<JobSummary>, EngineError> {
        Ok(self.repo.list()?)
    }

    /// Cancels in-flight work, removes the record and releases its bytes.
    ///
    /// Failing to release the bytes is logged and does not fail the delete.
    pub fn delete(&self, job_id: &str) -> Result<(), EngineError> {
        if self.inflight.cancel(job_id) {
            log::info!("Cancelling in-flight job {}", job_id);
        }
        let record = self.repo.delete(job_id)?;

        if let Err(e) = self.storage.release(&record.storage_location) {
            log::warn!("Failed to release bytes for deleted job {}: {}", job_id, e);
        }
        log::info!("Deleted job {}", job_id);
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.broadcaster.subscribe()
    }

    pub fn in_flight(&self) -> usize {
        self.inflight.len()
    }

    /// Blocks until the queue is empty and no job is running.
    pub fn drain(&self) {
        self.inflight.wait_idle();
    }

    /// Like [`drain`](Self::drain) with an upper bound. Returns true if idle.
    pub fn drain_timeout(&self, timeout: Duration) -> bool {
        self.inflight.wait_idle_timeout(timeout)
    }

    /// Stops accepting work, lets queued jobs finish and joins the workers.
    pub fn shutdown(&self) {
        self.pool.shutdown();
        self.drain();
        self.pool.wait();
    }

    fn fetch(&self, job_id: &str) -> Result<JobRecord, EngineError> {
        self.repo
            .fetch(job_id)?
            .ok_or_else(|| EngineError::NotFound(job_id.to_string()))
    }
}
