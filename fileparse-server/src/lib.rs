//! HTTP surface of the fileparse service.

pub mod error;
pub mod routes;
pub mod state;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

pub fn router(state: AppState) -> Router {
    let max_upload_bytes = state.max_upload_bytes();

    Router::new()
        .route("/health", get(routes::health))
        .merge(routes::file_routes(max_upload_bytes))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
