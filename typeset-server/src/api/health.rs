//! Health Check API Handler
//!
//! Simple health check endpoint for monitoring.

use axum::Json;
use typeset_core::dto::job::HealthResponse;

/// GET /health
/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        message: "OK".to_string(),
    })
}
