//! The job record and its state machine.
//!
//! Every mutation of a record goes through one of the transition methods
//! below. They enforce:
//! - `ready` and `failed` are terminal,
//! - progress never decreases while the job is live,
//! - progress is 100 exactly when ready and 0 right after failing,
//! - `parsed_content` exists only on ready jobs.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Highest progress value a live (non-ready) job may carry.
pub const MAX_LIVE_PROGRESS: u8 = 99;

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Uploading,
    Processing,
    Ready,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Uploading => "uploading",
            JobStatus::Processing => "processing",
            JobStatus::Ready => "ready",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "uploading" => Some(JobStatus::Uploading),
            "processing" => Some(JobStatus::Processing),
            "ready" => Some(JobStatus::Ready),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    /// Returns true for `ready` and `failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Ready | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured payload produced by an extractor.
///
/// Serialized untagged: rows become a JSON array of objects, documents an
/// object with `pages`, unsupported files an object with `note`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ParsedContent {
    Rows(Vec<Map<String, Value>>),
    Pages { pages: Vec<String> },
    Note { note: String },
}

impl ParsedContent {
    pub const UNSUPPORTED_NOTE: &'static str = "unsupported file type";

    pub fn unsupported() -> Self {
        ParsedContent::Note {
            note: Self::UNSUPPORTED_NOTE.to_string(),
        }
    }

    /// Number of rows or pages; zero for notes.
    pub fn len(&self) -> usize {
        match self {
            ParsedContent::Rows(rows) => rows.len(),
            ParsedContent::Pages { pages } => pages.len(),
            ParsedContent::Note { .. } => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Rejected state transition.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("job is already {0}")]
    Terminal(JobStatus),

    #[error("cannot move job from {from} to {to}")]
    Invalid { from: JobStatus, to: JobStatus },
}

/// The persistent record of one uploaded file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobRecord {
    pub id: String,
    pub filename: String,
    pub storage_location: PathBuf,
    pub status: JobStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed_content: Option<ParsedContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Creates a record in the `uploading` state.
    pub fn new(id: impl Into<String>, filename: impl Into<String>, storage_location: &Path) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            filename: filename.into(),
            storage_location: storage_location.to_path_buf(),
            status: JobStatus::Uploading,
            progress: 0,
            parsed_content: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn ensure_live(&self) -> Result<(), TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError::Terminal(self.status));
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// `uploading -> processing` once the bytes are fully persisted.
    ///
    /// Idempotent for a job that is already processing.
    pub fn begin_processing(&mut self) -> Result<(), TransitionError> {
        self.ensure_live()?;
        if self.status == JobStatus::Uploading {
            self.status = JobStatus::Processing;
            self.progress = self.progress.max(1);
            self.touch();
        }
        Ok(())
    }

    /// Applies a progress tick. The value is clamped to `[0, 99]` and never
    /// lowers the stored progress.
    pub fn advance(&mut self, percent: u8) -> Result<(), TransitionError> {
        self.ensure_live()?;
        if self.status != JobStatus::Processing {
            return Err(TransitionError::Invalid {
                from: self.status,
                to: JobStatus::Processing,
            });
        }
        let clamped = percent.min(MAX_LIVE_PROGRESS);
        if clamped > self.progress {
            self.progress = clamped;
            self.touch();
        }
        Ok(())
    }

    /// `processing -> ready`.
    pub fn complete(&mut self, content: ParsedContent) -> Result<(), TransitionError> {
        self.ensure_live()?;
        if self.status != JobStatus::Processing {
            return Err(TransitionError::Invalid {
                from: self.status,
                to: JobStatus::Ready,
            });
        }
        self.status = JobStatus::Ready;
        self.progress = 100;
        self.parsed_content = Some(content);
        self.error = None;
        self.touch();
        Ok(())
    }

    /// `uploading | processing -> failed`.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), TransitionError> {
        self.ensure_live()?;
        self.status = JobStatus::Failed;
        self.progress = 0;
        self.parsed_content = None;
        self.error = Some(reason.into());
        self.touch();
        Ok(())
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id.clone(),
            filename: self.filename.clone(),
            status: self.status,
            progress: self.progress,
            created_at: self.created_at,
        }
    }

    pub fn progress_view(&self) -> JobProgress {
        JobProgress {
            id: self.id.clone(),
            status: self.status,
            progress: self.progress,
        }
    }
}

/// Listing entry. Never carries the parsed payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobSummary {
    pub id: String,
    pub filename: String,
    pub status: JobStatus,
    pub progress: u8,
    pub created_at: DateTime<Utc>,
}

/// Status query result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobProgress {
    pub id: String,
    pub status: JobStatus,
    pub progress: u8,
}

/// Result query output for a ready job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobOutput {
    pub id: String,
    pub filename: String,
    pub parsed_content: ParsedContent,
}
