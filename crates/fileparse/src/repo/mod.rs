//! Record repository: durable storage of job records keyed by job id.
//!
//! Two backends share one contract. [`SqliteRepository`] persists through the
//! `db` layer; [`MemoryRepository`] keeps records in a map and is used for
//! volatile deployments and tests.

use thiserror::Error;

use crate::db::DatabaseError;
use crate::jobs::{JobRecord, JobSummary, TransitionError};

mod memory;
mod sqlite;

pub use memory::MemoryRepository;
pub use sqlite::SqliteRepository;

/// Mutation applied to a record inside the repository's critical section.
///
/// Returning an error aborts the update; nothing is written.
pub type Mutation<'a> = &'a mut dyn FnMut(&mut JobRecord) -> Result<(), TransitionError>;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job already exists: {0}")]
    AlreadyExists(String),

    #[error("Transition rejected: {0}")]
    Rejected(#[from] TransitionError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Failed to (de)serialize parsed content: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Stored job {id} is corrupt: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("Repository lock poisoned")]
    LockPoisoned,
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(e: rusqlite::Error) -> Self {
        RepositoryError::Database(DatabaseError::Sqlite(e))
    }
}

/// Storage contract for job records.
///
/// Implementations must make `update` atomic per record: concurrent callers
/// updating the same id observe each other's writes, never interleave them.
pub trait RecordRepository: Send + Sync {
    /// Stores a new record. Fails with `AlreadyExists` if the id is taken.
    fn create(&self, record: &JobRecord) -> Result<(), RepositoryError>;

    fn fetch(&self, id: &str) -> Result<Option<JobRecord>, RepositoryError>;

    /// Applies `mutation` to the stored record and persists the result.
    ///
    /// Returns the record as written.
    fn update(&self, id: &str, mutation: Mutation<'_>) -> Result<JobRecord, RepositoryError>;

    /// Removes the record and returns it.
    fn delete(&self, id: &str) -> Result<JobRecord, RepositoryError>;

    /// Snapshot of every job, newest first.
    fn list(&self) -> Result<Vec<JobSummary>, RepositoryError>;

    /// Backend name for logs.
    fn name(&self) -> &'static str;
}
