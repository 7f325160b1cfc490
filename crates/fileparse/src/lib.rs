pub mod broadcast;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod gateway;
pub mod jobs;
pub mod logging;
pub mod repo;
pub mod sanitize;
pub mod storage;
pub mod worker;

pub use broadcast::{JobProgressBroadcaster, JobProgressEvent};
pub use config::{load_config, resolve_config, Config, StorageBackend};
pub use db::Database;
pub use engine::{EngineError, EngineSettings, JobEngine, Submission};
pub use error::{
    ConfigError, ExtractError, FileparseError, GatewayError, Result, StorageError,
};
pub use extractor::{ContentKind, Extractor, ExtractorRegistry, ProgressReporter};
pub use gateway::{Ingestion, IngestionGateway};
pub use jobs::{JobOutput, JobProgress, JobRecord, JobStatus, JobSummary, ParsedContent};
pub use repo::{MemoryRepository, RecordRepository, RepositoryError, SqliteRepository};
pub use storage::UploadStorage;

use std::sync::Arc;

/// Opens the repository selected by `config.storage`.
pub fn open_repository(config: &Config) -> Result<Arc<dyn RecordRepository>> {
    let repo: Arc<dyn RecordRepository> = match config.storage.backend {
        StorageBackend::Sqlite => {
            let db = Database::open(&config.storage.database_path())?;
            Arc::new(SqliteRepository::new(db))
        }
        StorageBackend::Memory => {
            log::warn!("Using the in-memory repository; jobs will not survive a restart");
            Arc::new(MemoryRepository::new())
        }
    };
    Ok(repo)
}

/// Wires repository, upload storage and engine from a loaded config.
pub fn build_engine(config: &Config) -> Result<Arc<JobEngine>> {
    let repo = open_repository(config)?;
    let storage = UploadStorage::new(&config.storage.upload_dir);
    storage.ensure_root()?;

    let settings = EngineSettings::from(&config.engine);
    Ok(Arc::new(JobEngine::new(repo, Arc::new(storage), settings)))
}
