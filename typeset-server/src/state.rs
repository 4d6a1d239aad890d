//! Shared handler state

use std::sync::Arc;

use crate::service::{QueryService, SubmissionService};

/// State cloned into every request handler
///
/// Holds the only handle to the render queue, so dropping the router after
/// the server stops closes the queue.
#[derive(Clone)]
pub struct AppState {
    pub submissions: Arc<SubmissionService>,
    pub queries: Arc<QueryService>,
}

impl AppState {
    pub fn new(submissions: SubmissionService, queries: QueryService) -> Self {
        Self {
            submissions: Arc::new(submissions),
            queries: Arc::new(queries),
        }
    }
}
