use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Transaction, TransactionBehavior};

use super::{Mutation, RecordRepository, RepositoryError};
use crate::db::job_repo::{self, JobRow, JobSummaryRow};
use crate::db::Database;
use crate::jobs::{JobRecord, JobStatus, JobSummary, ParsedContent};

/// Repository backed by the SQLite `jobs` table.
///
/// Every call runs under the connection mutex held by [`Database`]; `update`
/// additionally wraps its read-modify-write in an IMMEDIATE transaction.
#[derive(Clone)]
pub struct SqliteRepository {
    db: Database,
}

impl SqliteRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

fn format_timestamp(dt: DateTime<Utc>) -> String {
    // Fixed-width so lexical ORDER BY matches chronological order.
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(id: &str, s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Corrupt {
            id: id.to_string(),
            reason: format!("bad timestamp '{}': {}", s, e),
        })
}

fn parse_status(id: &str, s: &str) -> Result<JobStatus, RepositoryError> {
    JobStatus::parse(s).ok_or_else(|| RepositoryError::Corrupt {
        id: id.to_string(),
        reason: format!("unknown status '{}'", s),
    })
}

fn parse_progress(id: &str, value: i64) -> Result<u8, RepositoryError> {
    u8::try_from(value)
        .ok()
        .filter(|p| *p <= 100)
        .ok_or_else(|| RepositoryError::Corrupt {
            id: id.to_string(),
            reason: format!("progress {} out of range", value),
        })
}

fn to_row(record: &JobRecord) -> Result<JobRow, RepositoryError> {
    let parsed_content = record
        .parsed_content
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    Ok(JobRow {
        id: record.id.clone(),
        filename: record.filename.clone(),
        storage_location: record.storage_location.to_string_lossy().to_string(),
        status: record.status.as_str().to_string(),
        progress: i64::from(record.progress),
        parsed_content,
        error: record.error.clone(),
        created_at: format_timestamp(record.created_at),
        updated_at: format_timestamp(record.updated_at),
    })
}

fn from_row(row: JobRow) -> Result<JobRecord, RepositoryError> {
    let parsed_content = row
        .parsed_content
        .as_deref()
        .map(serde_json::from_str::<ParsedContent>)
        .transpose()?;

    Ok(JobRecord {
        status: parse_status(&row.id, &row.status)?,
        progress: parse_progress(&row.id, row.progress)?,
        created_at: parse_timestamp(&row.id, &row.created_at)?,
        updated_at: parse_timestamp(&row.id, &row.updated_at)?,
        storage_location: PathBuf::from(row.storage_location),
        parsed_content,
        error: row.error,
        filename: row.filename,
        id: row.id,
    })
}

fn summary_from_row(row: JobSummaryRow) -> Result<JobSummary, RepositoryError> {
    Ok(JobSummary {
        status: parse_status(&row.id, &row.status)?,
        progress: parse_progress(&row.id, row.progress)?,
        created_at: parse_timestamp(&row.id, &row.created_at)?,
        filename: row.filename,
        id: row.id,
    })
}

impl RecordRepository for SqliteRepository {
    fn create(&self, record: &JobRecord) -> Result<(), RepositoryError> {
        let row = to_row(record)?;
        self.db.with_conn(|conn| {
            if job_repo::insert(conn, &row)? {
                Ok(())
            } else {
                Err(RepositoryError::AlreadyExists(row.id.clone()))
            }
        })
    }

    fn fetch(&self, id: &str) -> Result<Option<JobRecord>, RepositoryError> {
        let row = self
            .db
            .with_conn(|conn| job_repo::find_by_id(conn, id).map_err(RepositoryError::from))?;
        row.map(from_row).transpose()
    }

    fn update(&self, id: &str, mutation: Mutation<'_>) -> Result<JobRecord, RepositoryError> {
        self.db.with_conn(|conn| {
            let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

            let row = job_repo::find_by_id(&tx, id)?
                .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
            let mut record = from_row(row)?;
            mutation(&mut record)?;

            job_repo::update(&tx, &to_row(&record)?)?;
            tx.commit()?;
            Ok(record)
        })
    }

    fn delete(&self, id: &str) -> Result<JobRecord, RepositoryError> {
        self.db.with_conn(|conn| {
            let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

            let row = job_repo::find_by_id(&tx, id)?
                .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
            job_repo::delete(&tx, id)?;
            tx.commit()?;
            from_row(row)
        })
    }

    fn list(&self) -> Result<Vec<JobSummary>, RepositoryError> {
        let rows = self
            .db
            .with_conn(|conn| job_repo::list_summaries(conn).map_err(RepositoryError::from))?;
        rows.into_iter().map(summary_from_row).collect()
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}
