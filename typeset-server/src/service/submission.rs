//! Submission Service
//!
//! Accepts a new job: allocates its identity and directory, records it as
//! pending, stores its inputs and hands it to the render pool.

use std::error::Error as StdError;
use std::sync::Arc;

use bytes::Bytes;
use futures::Stream;
use thiserror::Error;
use typeset_core::domain::job::{JobId, JobStatus};

use crate::renderer::{RenderPool, ScheduleError};
use crate::repository::{StatusStore, StoreError};
use crate::storage::{JobDirectoryStore, StorageError};

/// Service error type
///
/// Only failures that prevent accepting the job; upload problems are
/// reported through [`StorageError`] and left to the caller.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to create job directory: {0}")]
    Directory(#[from] std::io::Error),

    #[error(transparent)]
    QueueClosed(#[from] ScheduleError),
}

pub struct SubmissionService {
    statuses: Arc<dyn StatusStore>,
    directories: JobDirectoryStore,
    pool: RenderPool,
}

impl SubmissionService {
    pub fn new(
        statuses: Arc<dyn StatusStore>,
        directories: JobDirectoryStore,
        pool: RenderPool,
    ) -> Self {
        Self {
            statuses,
            directories,
            pool,
        }
    }

    /// Allocate a job and record it as pending
    ///
    /// The directory exists and the status reads `pending` once this returns,
    /// so a status query issued right after acknowledgement never sees
    /// `non-existent`.
    pub async fn begin(&self) -> Result<JobId, SubmitError> {
        let id = JobId::generate();
        self.directories.ensure(id).await?;
        self.statuses.set(id, JobStatus::Pending).await?;

        tracing::info!("Job created: {}", id);
        Ok(id)
    }

    /// Stream one uploaded file into the job directory under its original name
    pub async fn store_input<S, E>(
        &self,
        id: JobId,
        name: &str,
        stream: S,
    ) -> Result<u64, StorageError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: StdError + Send + Sync + 'static,
    {
        let written = self.directories.write(id, name, stream).await?;
        tracing::debug!("Stored {} ({} bytes) for job {}", name, written, id);
        Ok(written)
    }

    /// Queue the job for rendering; waits for queue room, not for the render
    pub async fn schedule(&self, id: JobId) -> Result<(), SubmitError> {
        self.pool.schedule(id).await?;
        Ok(())
    }
}
