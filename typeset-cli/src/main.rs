//! Typeset CLI
//!
//! Command-line interface for submitting documents to the Typeset service.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "typeset")]
#[command(about = "Typeset LaTeX rendering CLI", long_about = None)]
struct Cli {
    /// Rendering service URL
    #[arg(long, env = "TYPESET_SERVER_URL", default_value = "http://localhost:8080")]
    server_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        server_url: cli.server_url,
    };

    handle_command(cli.command, &config).await
}
