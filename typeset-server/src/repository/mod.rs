//! Repository Module
//!
//! Data access layer for the rendering service.
//! The status repository is the only source of truth for job state.

pub mod status;

// Re-export for convenience
pub use status::{MemoryStatusStore, PgStatusStore, StatusStore, StoreError};
