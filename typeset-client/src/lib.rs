//! Typeset HTTP Client
//!
//! A small, type-safe HTTP client for the Typeset rendering service.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::time::Duration;
//! use typeset_client::{DocumentFetch, DocumentUpload, TypesetClient, UploadKind};
//!
//! #[tokio::main]
//! async fn main() -> typeset_client::Result<()> {
//!     let client = TypesetClient::new("http://localhost:8080");
//!
//!     let upload = DocumentUpload::from_path(UploadKind::Document, Path::new("main.tex")).await?;
//!     let accepted = client.submit_document(&[upload], None).await?;
//!     let job_id = accepted.job_id.to_string();
//!
//!     client
//!         .wait_for_terminal(&job_id, Duration::from_millis(500), None)
//!         .await?;
//!
//!     if let DocumentFetch::Saved { bytes } =
//!         client.download_document(&job_id, Path::new("main.pdf")).await?
//!     {
//!         println!("Saved {} bytes", bytes);
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
mod documents;

// Re-export commonly used types
pub use documents::{DocumentFetch, DocumentUpload, UploadKind};
pub use error::{ClientError, Result};

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the Typeset API
#[derive(Debug, Clone)]
pub struct TypesetClient {
    /// Base URL of the service (e.g., "http://localhost:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl TypesetClient {
    /// Create a new client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the service
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    ///
    /// This method checks the status code and returns an appropriate error if
    /// the request failed, or deserializes the response body if successful.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}
