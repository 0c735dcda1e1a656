//! Job listing and progress endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::processing::{QueueStats, RunProgress};
use crate::server::state::AppState;
use crate::types::Job;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// Response for job listing
#[derive(Debug, Serialize)]
pub struct JobsResponse {
    pub jobs: Vec<Job>,
    pub stats: QueueStats,
}

/// GET /jobs - Most recent jobs with queue statistics
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<JobsResponse>> {
    let jobs = state.store().list_recent(params.limit.clamp(1, 500))?;

    Ok(Json(JobsResponse {
        jobs,
        stats: state.queue().stats(),
    }))
}

/// GET /jobs/stats - Queue statistics
pub async fn queue_stats(State(state): State<AppState>) -> Json<QueueStats> {
    Json(state.queue().stats())
}

/// GET /jobs/:id/progress - Run progress since process start
pub async fn get_progress(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RunProgress>> {
    state
        .queue()
        .get_progress(&id)
        .map(Json)
        .ok_or(Error::JobNotFound(id))
}
