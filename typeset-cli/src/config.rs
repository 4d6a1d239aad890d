//! Configuration module
//!
//! Handles CLI configuration such as the service URL.

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the rendering service
    pub server_url: String,
}
