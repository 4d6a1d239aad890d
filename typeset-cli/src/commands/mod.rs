//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod document;

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Check that the service is up
    Health,
    /// Submit source files for rendering
    Submit {
        /// Source files; one of them must be main.tex
        #[arg(required = true)]
        documents: Vec<PathBuf>,

        /// Auxiliary files such as images (repeatable)
        #[arg(long = "image")]
        images: Vec<PathBuf>,

        /// URL the service should notify when the job finishes
        #[arg(long)]
        webhook_url: Option<String>,

        /// Wait for the job to finish and download the PDF
        #[arg(long)]
        wait: bool,

        /// Where to save the PDF with --wait (default: <job id>.pdf)
        #[arg(short, long, requires = "wait")]
        output: Option<PathBuf>,
    },
    /// Show the state of a job
    State {
        /// Job ID
        job_id: String,
    },
    /// Download the rendered PDF of a job
    Fetch {
        /// Job ID
        job_id: String,

        /// Where to save the PDF (default: <job id>.pdf)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Wait until a job finishes
    Wait {
        /// Job ID
        job_id: String,

        /// Polling interval in milliseconds
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,

        /// Give up after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    document::handle_document_command(command, config).await
}
