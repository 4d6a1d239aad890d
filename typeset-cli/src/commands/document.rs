//! Document command handlers
//!
//! Handles submission, state inspection, waiting and download.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use colored::*;
use typeset_client::{DocumentFetch, DocumentUpload, TypesetClient, UploadKind};
use typeset_core::domain::job::JobState;

use super::Commands;
use crate::config::Config;

/// Polling interval used by `submit --wait`
const SUBMIT_WAIT_INTERVAL: Duration = Duration::from_millis(500);

/// Handle document commands
pub async fn handle_document_command(command: Commands, config: &Config) -> Result<()> {
    let client = TypesetClient::new(&config.server_url);

    match command {
        Commands::Health => health(&client).await,
        Commands::Submit {
            documents,
            images,
            webhook_url,
            wait,
            output,
        } => {
            submit(
                &client,
                &documents,
                &images,
                webhook_url.as_deref(),
                wait,
                output,
            )
            .await
        }
        Commands::State { job_id } => show_state(&client, &job_id).await,
        Commands::Fetch { job_id, output } => fetch(&client, &job_id, output).await,
        Commands::Wait {
            job_id,
            interval_ms,
            timeout_secs,
        } => {
            let state = wait_for(
                &client,
                &job_id,
                Duration::from_millis(interval_ms),
                timeout_secs.map(Duration::from_secs),
            )
            .await?;
            ensure_success(&job_id, state)
        }
    }
}

async fn health(client: &TypesetClient) -> Result<()> {
    let health = client
        .health()
        .await
        .with_context(|| format!("Service at {} is not reachable", client.base_url()))?;

    println!("{} {}", "✓".green(), health.message);
    Ok(())
}

/// Upload the files, optionally waiting for the PDF
async fn submit(
    client: &TypesetClient,
    documents: &[PathBuf],
    images: &[PathBuf],
    webhook_url: Option<&str>,
    wait: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut uploads = Vec::with_capacity(documents.len() + images.len());
    for (kind, paths) in [(UploadKind::Document, documents), (UploadKind::Image, images)] {
        for path in paths {
            let upload = DocumentUpload::from_path(kind, path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            uploads.push(upload);
        }
    }

    if !uploads
        .iter()
        .any(|upload| upload.kind == UploadKind::Document && upload.file_name == "main.tex")
    {
        println!(
            "{}",
            "Warning: no main.tex among the documents; the job will fail with failed-no-source."
                .yellow()
        );
    }

    let accepted = client.submit_document(&uploads, webhook_url).await?;
    let job_id = accepted.job_id.to_string();

    println!("{}", accepted.message.green().bold());
    println!("  {}: {}", "Job ID".bold(), job_id.cyan());
    println!("  {}: {}", "Files".bold(), uploads.len());

    if !wait {
        return Ok(());
    }

    println!();
    let state = wait_for(client, &job_id, SUBMIT_WAIT_INTERVAL, None).await?;
    ensure_success(&job_id, state)?;
    fetch(client, &job_id, output).await
}

async fn show_state(client: &TypesetClient, job_id: &str) -> Result<()> {
    let reply = client.get_state(job_id).await?;

    println!("  {}: {}", "Job ID".bold(), reply.job_id.cyan());
    println!("  {}: {}", "State".bold(), format_state(reply.state));
    Ok(())
}

async fn fetch(client: &TypesetClient, job_id: &str, output: Option<PathBuf>) -> Result<()> {
    let dest = output.unwrap_or_else(|| default_output(job_id));

    match client.download_document(job_id, &dest).await? {
        DocumentFetch::Saved { bytes } => {
            println!(
                "{} Saved {} ({} bytes)",
                "✓".green(),
                dest.display().to_string().cyan(),
                bytes
            );
            Ok(())
        }
        DocumentFetch::NotReady(state) => {
            bail!("Job {} is not finished yet ({})", job_id, state)
        }
        DocumentFetch::Unavailable(state) => {
            bail!("Job {} has no document ({})", job_id, state)
        }
    }
}

async fn wait_for(
    client: &TypesetClient,
    job_id: &str,
    interval: Duration,
    timeout: Option<Duration>,
) -> Result<JobState> {
    println!("{}", format!("Waiting for job {}...", job_id).dimmed());

    let state = client.wait_for_terminal(job_id, interval, timeout).await?;

    println!("  {}: {}", "State".bold(), format_state(state));
    Ok(state)
}

fn ensure_success(job_id: &str, state: JobState) -> Result<()> {
    if state != JobState::Success {
        bail!("Job {} finished as {}", job_id, state);
    }
    Ok(())
}

/// `<job id>.pdf` in the working directory
fn default_output(job_id: &str) -> PathBuf {
    Path::new(".").join(format!("{}.pdf", job_id))
}

/// Format a job state with color
fn format_state(state: JobState) -> ColoredString {
    match state {
        JobState::Pending => state.as_str().yellow(),
        JobState::Processing => state.as_str().blue(),
        JobState::Success => state.as_str().green(),
        JobState::FailedNoSource | JobState::FailedRenderError => state.as_str().red(),
        JobState::NonExistent => state.as_str().dimmed(),
    }
}
