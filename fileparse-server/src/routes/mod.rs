//! HTTP routes.

pub mod files;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::state::AppState;

pub fn file_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/files",
            post(files::upload_file)
                .layer(DefaultBodyLimit::max(max_upload_bytes))
                .get(files::list_files),
        )
        .route(
            "/files/:id",
            get(files::get_file).delete(files::delete_file),
        )
        .route("/files/:id/progress", get(files::get_progress))
}

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
