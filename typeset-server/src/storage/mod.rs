//! Storage Module
//!
//! Filesystem-backed job working directories.

pub mod job_dir;

pub use job_dir::{ArtifactFile, JobDirectoryStore, StorageError, sanitize_file_name};
