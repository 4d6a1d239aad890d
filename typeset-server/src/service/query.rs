//! Query Service
//!
//! Read-only lookups for job state and rendered artifacts.

use std::sync::Arc;

use thiserror::Error;
use typeset_core::domain::job::{JobId, JobState, JobStatus};

use crate::repository::{StatusStore, StoreError};
use crate::storage::{ArtifactFile, JobDirectoryStore};

/// Service error type
#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to open artifact: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of an artifact lookup
#[derive(Debug)]
pub enum ArtifactLookup {
    /// Rendered successfully and the artifact is open for streaming
    Ready(ArtifactFile),
    /// Recorded as `success` but the artifact is not on disk
    Missing,
    /// Still pending or processing
    NotReady(JobState),
    /// Failed, or never submitted
    Unavailable(JobState),
}

pub struct QueryService {
    statuses: Arc<dyn StatusStore>,
    directories: JobDirectoryStore,
    artifact_file: String,
}

impl QueryService {
    pub fn new(
        statuses: Arc<dyn StatusStore>,
        directories: JobDirectoryStore,
        artifact_file: String,
    ) -> Self {
        Self {
            statuses,
            directories,
            artifact_file,
        }
    }

    /// Current state of a job
    ///
    /// Ids that are not valid job identities are reported `non-existent`
    /// without touching the store.
    pub async fn get_status(&self, raw_id: &str) -> Result<JobState, QueryError> {
        let Ok(id) = raw_id.parse::<JobId>() else {
            tracing::debug!("Id {:?} is not a job identity", raw_id);
            return Ok(JobState::NonExistent);
        };

        let status = self.statuses.get(id).await?;
        Ok(JobState::from(status))
    }

    /// Locate the rendered artifact of a job
    pub async fn get_artifact(&self, raw_id: &str) -> Result<ArtifactLookup, QueryError> {
        let Ok(id) = raw_id.parse::<JobId>() else {
            return Ok(ArtifactLookup::Unavailable(JobState::NonExistent));
        };

        let lookup = match self.statuses.get(id).await? {
            Some(JobStatus::Success) => {
                match self.directories.open_for_read(id, &self.artifact_file).await {
                    Ok(file) => ArtifactLookup::Ready(file),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        tracing::error!(
                            "Job {} succeeded but {} is missing",
                            id,
                            self.artifact_file
                        );
                        ArtifactLookup::Missing
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            Some(status @ (JobStatus::Pending | JobStatus::Processing)) => {
                ArtifactLookup::NotReady(status.into())
            }
            other => ArtifactLookup::Unavailable(other.into()),
        };

        Ok(lookup)
    }
}
