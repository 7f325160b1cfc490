//! Test harness for isolated engine runs.
//!
//! Every harness owns a temporary directory holding the upload directory and,
//! for the SQLite backend, the database file. Dropping the harness shuts the
//! engine down and removes everything.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tempfile::TempDir;
use tokio::sync::broadcast::error::TryRecvError;

use fileparse::{
    Database, EngineSettings, Ingestion, IngestionGateway, JobEngine, JobProgressEvent, JobRecord,
    MemoryRepository, RecordRepository, SqliteRepository, UploadStorage,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Memory,
    Sqlite,
}

pub struct TestHarness {
    temp_dir: TempDir,
    pub upload_dir: PathBuf,
    pub database_path: Option<PathBuf>,
    pub repo: Arc<dyn RecordRepository>,
    pub gateway: IngestionGateway,
}

impl TestHarness {
    /// In-memory repository, two workers.
    pub fn new() -> Self {
        Self::with_backend(Backend::Memory)
    }

    pub fn with_backend(backend: Backend) -> Self {
        Self::with_settings(
            backend,
            EngineSettings {
                workers: 2,
                batch_size: 2,
                retry_backoff: Duration::from_millis(1),
                ..EngineSettings::default()
            },
        )
    }

    pub fn with_settings(backend: Backend, settings: EngineSettings) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let upload_dir = temp_dir.path().join("uploads");

        let (repo, database_path) = match backend {
            Backend::Memory => (
                Arc::new(MemoryRepository::new()) as Arc<dyn RecordRepository>,
                None,
            ),
            Backend::Sqlite => {
                let path = temp_dir.path().join("fileparse.db");
                let db = Database::open(&path).expect("Failed to open database");
                (
                    Arc::new(SqliteRepository::new(db)) as Arc<dyn RecordRepository>,
                    Some(path),
                )
            }
        };

        let storage = UploadStorage::new(&upload_dir);
        storage.ensure_root().expect("Failed to create upload dir");
        let engine = JobEngine::new(Arc::clone(&repo), Arc::new(storage), settings);

        Self {
            temp_dir,
            upload_dir,
            database_path,
            repo,
            gateway: IngestionGateway::new(Arc::new(engine)),
        }
    }

    pub fn engine(&self) -> &JobEngine {
        self.gateway.engine()
    }

    /// Uploads `bytes` as `filename` and waits for the engine to go idle.
    pub async fn upload_and_wait(&self, filename: &str, bytes: &[u8]) -> JobRecord {
        let ingestion = self.upload(filename, bytes).await;
        self.engine().drain();
        self.record(&ingestion.job_id)
    }

    pub async fn upload(&self, filename: &str, bytes: &[u8]) -> Ingestion {
        self.gateway
            .ingest_bytes(filename, Bytes::copy_from_slice(bytes))
            .await
            .expect("Upload failed")
    }

    pub fn record(&self, id: &str) -> JobRecord {
        self.repo
            .fetch(id)
            .expect("Repository read failed")
            .expect("Record missing")
    }

    /// Files currently present in the upload directory.
    pub fn stored_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(&self.upload_dir)
            .map(|entries| entries.filter_map(|e| e.ok()).map(|e| e.path()).collect())
            .unwrap_or_default()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TestHarness {
    fn drop(&mut self) {
        self.gateway.engine().shutdown();
    }
}

/// Drains every buffered event for `job_id`.
pub fn events_for(
    rx: &mut tokio::sync::broadcast::Receiver<JobProgressEvent>,
    job_id: &str,
) -> Vec<JobProgressEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) if event.job_id == job_id => events.push(event),
            Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }
    events
}
