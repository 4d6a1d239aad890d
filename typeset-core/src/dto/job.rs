//! Job DTOs exchanged over the HTTP API

use serde::{Deserialize, Serialize};

use crate::domain::job::{JobId, JobState};

/// Message returned with every accepted submission
pub const SUBMISSION_ACCEPTED: &str = "Document received";

/// Detail returned when a successful job has no artifact on disk
pub const ARTIFACT_MISSING_DETAIL: &str = "Output file not found.";

/// Body of `POST /document` (202)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionAccepted {
    pub message: String,
    pub job_id: JobId,
}

impl SubmissionAccepted {
    pub fn new(job_id: JobId) -> Self {
        Self {
            message: SUBMISSION_ACCEPTED.to_string(),
            job_id,
        }
    }
}

/// Body of `GET /state/{job_id}` and of the non-200 `GET /document/{job_id}` replies
///
/// `job_id` echoes the requested id verbatim, so ids that are not valid job
/// identities can still be reported as `non-existent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStateResponse {
    pub job_id: String,
    pub state: JobState,
}

/// Body of the 500 reply for a successful job whose artifact is gone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactErrorResponse {
    pub job_id: String,
    /// Always `"error"`
    pub state: String,
    pub detail: String,
}

impl ArtifactErrorResponse {
    pub fn missing(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            state: "error".to_string(),
            detail: ARTIFACT_MISSING_DETAIL.to_string(),
        }
    }
}

/// Body of `GET /health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub message: String,
}
