//! Upload, status, result and delete endpoints for files.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use fileparse::{Ingestion, JobOutput, JobProgress, JobSummary};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Multipart field carrying the uploaded file.
pub const FILE_FIELD: &str = "file";

/// Name used when the client sends no filename.
const FALLBACK_FILENAME: &str = "upload";

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /files
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Ingestion>)> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            log::debug!("Skipping multipart field {:?}", field.name());
            continue;
        }

        let filename = field
            .file_name()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(FALLBACK_FILENAME)
            .to_string();

        let ingestion = state.gateway().ingest(&filename, field).await?;
        log::info!(
            "Accepted upload '{}' as job {} ({} bytes)",
            filename,
            ingestion.job_id,
            ingestion.bytes_written
        );
        return Ok((StatusCode::CREATED, Json(ingestion)));
    }

    Err(ApiError::BadRequest(format!(
        "Missing multipart field '{}'",
        FILE_FIELD
    )))
}

/// GET /files/:id/progress
pub async fn get_progress(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobProgress>> {
    Ok(Json(state.engine().get_status(&id)?))
}

/// GET /files/:id
pub async fn get_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobOutput>> {
    Ok(Json(state.engine().get_result(&id)?))
}

/// GET /files
pub async fn list_files(State(state): State<AppState>) -> ApiResult<Json<Vec<JobSummary>>> {
    Ok(Json(state.engine().list()?))
}

/// DELETE /files/:id
pub async fn delete_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    state.engine().delete(&id)?;
    Ok(Json(DeleteResponse { deleted: true }))
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(e.body_text())
    } else {
        ApiError::BadRequest(e.body_text())
    }
}
