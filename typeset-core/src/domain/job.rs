//! Job domain types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque job identity
///
/// Generated once at submission from a random v4 UUID and never reused.
/// Every component derives the job's storage location and status key from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Allocates a fresh random identity
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Stored job status
///
/// Status only moves forward: `Pending -> Processing -> {Success, FailedRenderError}`,
/// with the short-circuit `Pending -> FailedNoSource` when the source file is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobStatus {
    Pending,
    Processing,
    Success,
    FailedNoSource,
    FailedRenderError,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Success => "success",
            JobStatus::FailedNoSource => "failed-no-source",
            JobStatus::FailedRenderError => "failed-render-error",
        }
    }

    /// Whether moving from `self` to `next` keeps the status monotonic
    pub fn can_advance_to(&self, next: JobStatus) -> bool {
        matches!(
            (*self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Pending, JobStatus::FailedNoSource)
                | (JobStatus::Processing, JobStatus::Success)
                | (JobStatus::Processing, JobStatus::FailedRenderError)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stored status string is not part of the status domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown job status: {:?}", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for JobStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "success" => Ok(JobStatus::Success),
            "failed-no-source" => Ok(JobStatus::FailedNoSource),
            "failed-render-error" => Ok(JobStatus::FailedRenderError),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Job state as reported to callers
///
/// Every stored status plus the `NonExistent` sentinel, which is reported for
/// ids without a record and is never written to the status store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobState {
    Pending,
    Processing,
    Success,
    FailedNoSource,
    FailedRenderError,
    NonExistent,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Processing => "processing",
            JobState::Success => "success",
            JobState::FailedNoSource => "failed-no-source",
            JobState::FailedRenderError => "failed-render-error",
            JobState::NonExistent => "non-existent",
        }
    }

    /// Accepted but not finished yet
    pub fn is_in_flight(&self) -> bool {
        matches!(self, JobState::Pending | JobState::Processing)
    }

    /// Polling can stop: the job finished or was never accepted
    pub fn is_settled(&self) -> bool {
        !self.is_in_flight()
    }
}

impl From<JobStatus> for JobState {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Pending => JobState::Pending,
            JobStatus::Processing => JobState::Processing,
            JobStatus::Success => JobState::Success,
            JobStatus::FailedNoSource => JobState::FailedNoSource,
            JobStatus::FailedRenderError => JobState::FailedRenderError,
        }
    }
}

impl From<Option<JobStatus>> for JobState {
    fn from(status: Option<JobStatus>) -> Self {
        status.map(JobState::from).unwrap_or(JobState::NonExistent)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
