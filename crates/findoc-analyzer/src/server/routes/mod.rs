//! API routes for the analyzer server

pub mod analyze;
pub mod jobs;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        // Upload with a larger body limit
        .route(
            "/analyze",
            post(analyze::analyze_document).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/result/:id", get(analyze::get_result))
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/stats", get(jobs::queue_stats))
        .route("/jobs/:id/progress", get(jobs::get_progress))
}

/// Liveness message
async fn root() -> Json<Value> {
    Json(json!({
        "status": "success",
        "message": "Financial Document Analyzer API running",
    }))
}
