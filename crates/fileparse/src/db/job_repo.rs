//! Job repository: CRUD statements for the `jobs` table.
//!
//! Functions take a `&Connection` so they compose inside a transaction opened
//! by the caller.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::DatabaseError;

/// A raw job row from the database.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: String,
    pub filename: String,
    pub storage_location: String,
    pub status: String,
    pub progress: i64,
    /// JSON text; only set for ready jobs.
    pub parsed_content: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            filename: row.get("filename")?,
            storage_location: row.get("storage_location")?,
            status: row.get("status")?,
            progress: row.get("progress")?,
            parsed_content: row.get("parsed_content")?,
            error: row.get("error")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// A job row without the parsed payload, for listings.
#[derive(Debug, Clone)]
pub struct JobSummaryRow {
    pub id: String,
    pub filename: String,
    pub status: String,
    pub progress: i64,
    pub created_at: String,
}

/// Inserts a new job row. Returns `false` if the id already exists.
pub fn insert(conn: &Connection, job: &JobRow) -> Result<bool, DatabaseError> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO jobs (id, filename, storage_location, status, progress,
         parsed_content, error, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            job.id,
            job.filename,
            job.storage_location,
            job.status,
            job.progress,
            job.parsed_content,
            job.error,
            job.created_at,
            job.updated_at,
        ],
    )?;
    Ok(inserted == 1)
}

/// Overwrites the mutable columns of an existing job row.
///
/// `filename`, `storage_location` and `created_at` are immutable and never
/// written here.
pub fn update(conn: &Connection, job: &JobRow) -> Result<bool, DatabaseError> {
    let updated = conn.execute(
        "UPDATE jobs SET status=?2, progress=?3, parsed_content=?4, error=?5, updated_at=?6
         WHERE id=?1",
        params![
            job.id,
            job.status,
            job.progress,
            job.parsed_content,
            job.error,
            job.updated_at,
        ],
    )?;
    Ok(updated == 1)
}

/// Finds a job by its ID.
pub fn find_by_id(conn: &Connection, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT * FROM jobs WHERE id = ?1",
            params![id],
            JobRow::from_row,
        )
        .optional()?;
    Ok(row)
}

/// Deletes a job by its ID. Returns `false` if nothing was deleted.
pub fn delete(conn: &Connection, id: &str) -> Result<bool, DatabaseError> {
    let deleted = conn.execute("DELETE FROM jobs WHERE id = ?1", params![id])?;
    Ok(deleted == 1)
}

/// Lists every job, newest first, without the parsed payload.
pub fn list_summaries(conn: &Connection) -> Result<Vec<JobSummaryRow>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, filename, status, progress, created_at FROM jobs
         ORDER BY created_at DESC, id ASC",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(JobSummaryRow {
                id: row.get(0)?,
                filename: row.get(1)?,
                status: row.get(2)?,
                progress: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
