//! Ingestion gateway: turns an incoming upload into a queued job.

use std::sync::Arc;

use bytes::Bytes;
use futures_util::{stream, Stream};
use serde::Serialize;

use crate::engine::{EngineError, JobEngine, Submission};
use crate::error::GatewayError;
use crate::jobs::{JobRecord, JobStatus};

/// What the caller gets back once an upload is accepted.
#[derive(Debug, Clone, Serialize)]
pub struct Ingestion {
    pub job_id: String,
    /// Status observed after handoff; a fast job may already be terminal.
    pub status: JobStatus,
    #[serde(skip)]
    pub bytes_written: u64,
    #[serde(skip)]
    pub submission: Submission,
}

pub struct IngestionGateway {
    engine: Arc<JobEngine>,
}

impl IngestionGateway {
    pub fn new(engine: Arc<JobEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<JobEngine> {
        &self.engine
    }

    /// Registers the upload, streams its bytes to storage and submits it.
    ///
    /// If anything fails after the record exists, the record is moved to
    /// `failed` before the error is returned.
    pub async fn ingest<S, E>(&self, filename: &str, body: S) -> Result<Ingestion, GatewayError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: std::fmt::Display,
    {
        let record = self.engine.create(filename)?;
        self.store_and_submit(record, body).await
    }

    /// Everything after the record exists. A delete may land at any point in
    /// here, so every failure path goes through [`Self::abandon`].
    async fn store_and_submit<S, E>(
        &self,
        record: JobRecord,
        body: S,
    ) -> Result<Ingestion, GatewayError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: std::fmt::Display,
    {
        let bytes_written = match self
            .engine
            .storage()
            .persist(&record.storage_location, body)
            .await
        {
            Ok(n) => n,
            Err(e) => {
                self.abandon(&record, &e.to_string());
                return Err(e.into());
            }
        };
        log::debug!("Stored {} bytes for job {}", bytes_written, record.id);

        let record = match self.engine.begin_processing(&record.id) {
            Ok(updated) => updated,
            Err(e) => {
                self.abandon(&record, &e.to_string());
                return Err(e.into());
            }
        };

        let submission = match self.engine.submit(&record.id) {
            Ok(submission) => submission,
            Err(e) => {
                self.abandon(&record, &e.to_string());
                return Err(e.into());
            }
        };

        let status = self
            .engine
            .get_status(&record.id)
            .map(|p| p.status)
            .unwrap_or(record.status);

        Ok(Ingestion {
            job_id: record.id,
            status,
            bytes_written,
            submission,
        })
    }

    /// Convenience for callers that already hold the whole body.
    pub async fn ingest_bytes(
        &self,
        filename: &str,
        body: Bytes,
    ) -> Result<Ingestion, GatewayError> {
        let body = stream::once(async move { Ok::<_, std::convert::Infallible>(body) });
        self.ingest(filename, body).await
    }

    fn abandon(&self, record: &JobRecord, reason: &str) {
        match self.engine.fail(&record.id, reason) {
            Ok(_) => {}
            Err(EngineError::NotFound(_)) => {
                // Deleted mid-upload. The delete may have run before the file
                // existed, so the bytes have no owner left.
                log::info!("Job {} was deleted during upload", record.id);
                if let Err(e) = self.engine.storage().release(&record.storage_location) {
                    log::warn!("Failed to release bytes for job {}: {}", record.id, e);
                }
            }
            Err(e) => log::warn!("Could not mark job {} as failed: {}", record.id, e),
        }
    }
}
