//! Document-related API endpoints

use std::path::Path;
use std::time::{Duration, Instant};

use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use tokio::io::AsyncWriteExt;
use typeset_core::domain::job::JobState;
use typeset_core::dto::job::{HealthResponse, JobStateResponse, SubmissionAccepted};

use crate::TypesetClient;
use crate::error::{ClientError, Result};

/// Header naming a URL to notify when the job finishes
const WEBHOOK_HEADER: &str = "X-Webhook-Url";

/// Multipart field an upload is sent under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    /// Source files, including the primary `main.tex`
    Document,
    /// Auxiliary files referenced by the sources
    Image,
}

impl UploadKind {
    pub fn field_name(&self) -> &'static str {
        match self {
            UploadKind::Document => "document",
            UploadKind::Image => "image",
        }
    }
}

/// One file of a submission
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub kind: UploadKind,
    /// Name the file is stored under on the server
    pub file_name: String,
    pub content: Vec<u8>,
}

impl DocumentUpload {
    pub fn new(
        kind: UploadKind,
        file_name: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            kind,
            file_name: file_name.into(),
            content: content.into(),
        }
    }

    /// Read a local file, keeping its final path component as the name
    pub async fn from_path(kind: UploadKind, path: &Path) -> Result<Self> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("{} has no usable file name", path.display()),
                )
            })?
            .to_string();
        let content = tokio::fs::read(path).await?;

        Ok(Self::new(kind, file_name, content))
    }
}

/// Outcome of a download attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentFetch {
    /// The PDF was written to the destination
    Saved { bytes: u64 },
    /// The job is still pending or processing
    NotReady(JobState),
    /// The job failed or does not exist
    Unavailable(JobState),
}

impl TypesetClient {
    // =============================================================================
    // Health
    // =============================================================================

    /// Check that the service answers
    pub async fn health(&self) -> Result<HealthResponse> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    // =============================================================================
    // Documents
    // =============================================================================

    /// Submit a bundle of files for rendering
    ///
    /// Returns as soon as the service has accepted the job.
    pub async fn submit_document(
        &self,
        uploads: &[DocumentUpload],
        webhook_url: Option<&str>,
    ) -> Result<SubmissionAccepted> {
        let url = format!("{}/document", self.base_url);

        let form = uploads.iter().fold(Form::new(), |form, upload| {
            form.part(
                upload.kind.field_name(),
                Part::bytes(upload.content.clone()).file_name(upload.file_name.clone()),
            )
        });

        let mut request = self.client.post(&url).multipart(form);
        if let Some(webhook_url) = webhook_url {
            request = request.header(WEBHOOK_HEADER, webhook_url);
        }

        tracing::debug!("Submitting {} file(s) to {}", uploads.len(), url);
        let response = request.send().await?;

        self.handle_response(response).await
    }

    /// Current state of a job
    pub async fn get_state(&self, job_id: &str) -> Result<JobStateResponse> {
        let url = format!("{}/state/{}", self.base_url, job_id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Download the rendered PDF of a job into `dest`
    ///
    /// The destination is only created when the PDF is available. A 500
    /// reply (job succeeded but its PDF is gone) is returned as an error.
    pub async fn download_document(&self, job_id: &str, dest: &Path) -> Result<DocumentFetch> {
        let url = format!("{}/document/{}", self.base_url, job_id);
        let mut response = self.client.get(&url).send().await?;

        match response.status() {
            StatusCode::OK => {
                let mut file = tokio::fs::File::create(dest).await?;
                let mut bytes = 0u64;
                while let Some(chunk) = response.chunk().await? {
                    bytes += chunk.len() as u64;
                    file.write_all(&chunk).await?;
                }
                file.flush().await?;

                tracing::debug!("Saved {} bytes to {}", bytes, dest.display());
                Ok(DocumentFetch::Saved { bytes })
            }
            StatusCode::ACCEPTED => Ok(DocumentFetch::NotReady(state_of(response).await?)),
            StatusCode::NOT_FOUND => Ok(DocumentFetch::Unavailable(state_of(response).await?)),
            status => {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                Err(ClientError::api_error(status.as_u16(), error_text))
            }
        }
    }

    /// Poll the job state until it settles
    ///
    /// Returns the settled state; `non-existent` counts as settled. With a
    /// `timeout`, gives up once it has elapsed.
    pub async fn wait_for_terminal(
        &self,
        job_id: &str,
        interval: Duration,
        timeout: Option<Duration>,
    ) -> Result<JobState> {
        let started = Instant::now();

        loop {
            let state = self.get_state(job_id).await?.state;
            if state.is_settled() {
                return Ok(state);
            }

            if timeout.is_some_and(|timeout| started.elapsed() >= timeout) {
                return Err(ClientError::Timeout {
                    job_id: job_id.to_string(),
                    waited: started.elapsed(),
                });
            }

            tracing::debug!("Job {} is {}, polling again", job_id, state);
            tokio::time::sleep(interval).await;
        }
    }
}

async fn state_of(response: reqwest::Response) -> Result<JobState> {
    let body = response.bytes().await?;
    serde_json::from_slice::<JobStateResponse>(&body)
        .map(|reply| reply.state)
        .map_err(|e| ClientError::ParseError(format!("Failed to parse state reply: {}", e)))
}
