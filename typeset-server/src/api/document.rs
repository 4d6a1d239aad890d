//! Document API Handlers
//!
//! HTTP endpoints for submitting documents and retrieving rendered artifacts.

use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use typeset_core::dto::job::{ArtifactErrorResponse, JobStateResponse, SubmissionAccepted};

use crate::api::error::{ApiError, ApiResult};
use crate::service::ArtifactLookup;
use crate::state::AppState;
use crate::storage::StorageError;

/// Header naming a URL to notify when the job finishes
pub const WEBHOOK_HEADER: &str = "x-webhook-url";

/// Multipart field carrying source files
const DOCUMENT_FIELD: &str = "document";

/// Multipart field carrying auxiliary files
const IMAGE_FIELD: &str = "image";

// =============================================================================
// Submission
// =============================================================================

/// POST /document
/// Accept a document bundle and queue it for rendering
///
/// Upload problems stop reading but still acknowledge the job: the render
/// step classifies whatever arrived.
pub async fn submit_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<SubmissionAccepted>)> {
    let job_id = state.submissions.begin().await?;

    if let Some(url) = webhook_url(&headers) {
        tracing::info!("Job {} requested webhook {} (not delivered)", job_id, url);
    }

    let mut stored = 0usize;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Malformed upload for job {}: {}", job_id, e);
                break;
            }
        };

        let kind = field.name().unwrap_or_default().to_string();
        if kind != DOCUMENT_FIELD && kind != IMAGE_FIELD {
            tracing::warn!("Ignoring unexpected field {:?} for job {}", kind, job_id);
            continue;
        }
        let Some(file_name) = field.file_name().map(str::to_string) else {
            tracing::warn!("Ignoring {} part without a file name for job {}", kind, job_id);
            continue;
        };

        match state.submissions.store_input(job_id, &file_name, field).await {
            Ok(_) => stored += 1,
            Err(StorageError::InvalidFileName(name)) => {
                tracing::warn!("Ignoring {} part named {:?} for job {}", kind, name, job_id);
            }
            Err(e) => {
                tracing::warn!("Upload of {} failed for job {}: {}", file_name, job_id, e);
                break;
            }
        }
    }

    tracing::debug!("Job {} received {} file(s)", job_id, stored);

    state.submissions.schedule(job_id).await?;

    Ok((StatusCode::ACCEPTED, Json(SubmissionAccepted::new(job_id))))
}

fn webhook_url(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(WEBHOOK_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|url| !url.is_empty())
}

// =============================================================================
// Retrieval
// =============================================================================

/// GET /document/{job_id}
/// Stream the rendered PDF, or report why it is not available
pub async fn download_document(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Response> {
    tracing::debug!("Downloading document for job: {}", job_id);

    let response = match state.queries.get_artifact(&job_id).await? {
        ArtifactLookup::Ready(file) => {
            tracing::info!("Job {} PDF downloaded ({} bytes)", job_id, file.size());
            artifact_response(&job_id, file.size(), Body::from_stream(file.into_stream()))?
        }
        ArtifactLookup::Missing => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ArtifactErrorResponse::missing(job_id)),
        )
            .into_response(),
        ArtifactLookup::NotReady(job_state) => (
            StatusCode::ACCEPTED,
            Json(JobStateResponse {
                job_id,
                state: job_state,
            }),
        )
            .into_response(),
        ArtifactLookup::Unavailable(job_state) => (
            StatusCode::NOT_FOUND,
            Json(JobStateResponse {
                job_id,
                state: job_state,
            }),
        )
            .into_response(),
    };

    Ok(response)
}

fn artifact_response(job_id: &str, len: u64, body: Body) -> ApiResult<Response> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}.pdf\"", job_id),
        )
        .header(header::CONTENT_LENGTH, len)
        .body(body)
        .map_err(|e| ApiError::InternalError(format!("Failed to build response: {}", e)))
}
