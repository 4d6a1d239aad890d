//! Job State API Handler

use axum::{
    Json,
    extract::{Path, State},
};
use typeset_core::dto::job::JobStateResponse;

use crate::api::error::ApiResult;
use crate::state::AppState;

/// GET /state/{job_id}
/// Current state of a job; unknown ids answer `non-existent`, never 404
pub async fn get_state(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobStateResponse>> {
    tracing::debug!("Getting state of job: {}", job_id);

    let job_state = state.queries.get_status(&job_id).await?;

    Ok(Json(JobStateResponse {
        job_id,
        state: job_state,
    }))
}
