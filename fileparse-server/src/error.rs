use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use fileparse::{EngineError, GatewayError, JobStatus, StorageError};

/// Message returned while a job has no result yet.
pub const NOT_READY_MESSAGE: &str = "File upload or processing in progress. Please try again later.";

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound,
    /// The job exists but has no result yet. Rendered as `202`.
    NotReady(JobStatus),
    PayloadTooLarge(String),
    Unavailable(String),
    Internal(String),
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::NotFound(_) => ApiError::NotFound,
            EngineError::NotReady { status, .. } => ApiError::NotReady(status),
            EngineError::ShuttingDown => {
                ApiError::Unavailable("Server is shutting down".to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Engine(e) => e.into(),
            GatewayError::Storage(StorageError::ReadBody { reason, .. }) => {
                ApiError::BadRequest(format!("Failed to read upload: {}", reason))
            }
            GatewayError::Storage(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotReady(job_status) => (
                StatusCode::ACCEPTED,
                json!({ "message": NOT_READY_MESSAGE, "status": job_status }),
            ),
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                json!({ "error": "File not found" }),
            ),
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, json!({ "error": message }))
            }
            ApiError::PayloadTooLarge(message) => {
                (StatusCode::PAYLOAD_TOO_LARGE, json!({ "error": message }))
            }
            ApiError::Unavailable(message) => {
                (StatusCode::SERVICE_UNAVAILABLE, json!({ "error": message }))
            }
            ApiError::Internal(message) => {
                log::error!("Request failed: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": message }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
