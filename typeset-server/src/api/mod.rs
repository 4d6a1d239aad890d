//! API Module
//!
//! HTTP API layer for the rendering service.
//! Each submodule handles endpoints for a specific resource.

pub mod document;
pub mod error;
pub mod health;
pub mod state;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Create the main API router with all endpoints
pub fn create_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Document endpoints
        .route("/document", post(document::submit_document))
        .route("/document/{job_id}", get(document::download_document))
        // State endpoints
        .route("/state/{job_id}", get(state::get_state))
        // Add state and middleware
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
}
