//! Rendering invoker
//!
//! Runs the external typesetting engine for one job and classifies the
//! outcome by exit status alone:
//! - source file absent: `failed-no-source`, the engine never starts
//! - exit code 0: `success`
//! - anything else (nonzero code, signal, spawn failure, timeout): `failed-render-error`

use std::process::Stdio;
use std::sync::Arc;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, error, info, warn};
use typeset_core::domain::job::{JobId, JobStatus};

use crate::config::RendererConfig;
use crate::repository::{StatusStore, StoreError};
use crate::storage::JobDirectoryStore;

/// Render error type
///
/// Engine failures are not errors: they are classified into a job status.
/// These variants cover the cases where the status itself could not be recorded.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to inspect job directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("job {id} cannot move from {from:?} to {to}")]
    InvalidTransition {
        id: JobId,
        from: Option<JobStatus>,
        to: JobStatus,
    },
}

/// How a single engine run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineOutcome {
    Succeeded,
    /// `exit_code` is `None` when the process was terminated by a signal
    Failed { exit_code: Option<i32> },
    TimedOut,
    /// The process could not be started or waited on
    Crashed { error: String },
}

impl EngineOutcome {
    /// Terminal status recorded for this outcome
    pub fn status(&self) -> JobStatus {
        match self {
            EngineOutcome::Succeeded => JobStatus::Success,
            EngineOutcome::Failed { .. }
            | EngineOutcome::TimedOut
            | EngineOutcome::Crashed { .. } => JobStatus::FailedRenderError,
        }
    }
}

/// Runs the rendering engine against job directories
pub struct RenderInvoker {
    statuses: Arc<dyn StatusStore>,
    directories: JobDirectoryStore,
    config: RendererConfig,
}

impl RenderInvoker {
    pub fn new(
        statuses: Arc<dyn StatusStore>,
        directories: JobDirectoryStore,
        config: RendererConfig,
    ) -> Self {
        Self {
            statuses,
            directories,
            config,
        }
    }

    /// Render one job to a terminal status
    pub async fn render(&self, id: JobId) -> Result<JobStatus, RenderError> {
        if !self.directories.exists(id, &self.config.source_file).await? {
            warn!(
                "Job {} has no {}, not starting the engine",
                id, self.config.source_file
            );
            self.advance(id, JobStatus::FailedNoSource).await?;
            return Ok(JobStatus::FailedNoSource);
        }

        self.advance(id, JobStatus::Processing).await?;

        let outcome = self.run_engine(id).await;
        match &outcome {
            EngineOutcome::Succeeded => debug!("Engine finished job {}", id),
            EngineOutcome::Failed { exit_code } => {
                warn!("Engine failed for job {} (exit code {:?})", id, exit_code)
            }
            EngineOutcome::TimedOut => warn!(
                "Engine exceeded {:?} for job {} and was killed",
                self.config.timeout, id
            ),
            EngineOutcome::Crashed { error } => {
                error!("Engine could not run for job {}: {}", id, error)
            }
        }

        let status = outcome.status();
        self.advance(id, status).await?;
        Ok(status)
    }

    /// Record a forward status transition
    async fn advance(&self, id: JobId, next: JobStatus) -> Result<(), RenderError> {
        let current = self.statuses.get(id).await?;
        if !current.is_some_and(|status| status.can_advance_to(next)) {
            error!(
                "Refusing to move job {} from {:?} to {}",
                id, current, next
            );
            return Err(RenderError::InvalidTransition {
                id,
                from: current,
                to: next,
            });
        }

        self.statuses.set(id, next).await?;
        info!("Job {} is now {}", id, next);
        Ok(())
    }

    /// Spawn the engine in the job directory and wait for it to exit
    async fn run_engine(&self, id: JobId) -> EngineOutcome {
        let dir = self.directories.resolve(id);
        let source = dir.join(&self.config.source_file);

        debug!(
            "Running {} {} in {}",
            self.config.program.display(),
            source.display(),
            dir.display()
        );

        let mut child = match Command::new(&self.config.program)
            .arg(&source)
            .current_dir(&dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                return EngineOutcome::Crashed {
                    error: format!("failed to spawn {}: {}", self.config.program.display(), e),
                };
            }
        };

        let waited = match self.config.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(waited) => waited,
                Err(_) => {
                    if let Err(e) = child.kill().await {
                        warn!("Failed to kill engine for job {}: {}", id, e);
                    }
                    return EngineOutcome::TimedOut;
                }
            },
            None => child.wait().await,
        };

        match waited {
            Ok(status) if status.success() => EngineOutcome::Succeeded,
            Ok(status) => EngineOutcome::Failed {
                exit_code: status.code(),
            },
            Err(e) => EngineOutcome::Crashed {
                error: format!("failed to wait for engine: {}", e),
            },
        }
    }
}
