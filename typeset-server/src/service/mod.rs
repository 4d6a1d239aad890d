//! Service Module
//!
//! Business logic layer for the rendering service.
//! Services sit between the HTTP handlers and the stores.

pub mod query;
pub mod submission;

pub use query::{ArtifactLookup, QueryError, QueryService};
pub use submission::{SubmissionService, SubmitError};
