//! Core domain types
//!
//! These types are shared between the server (which persists and advances
//! job status) and clients (which poll it).

pub mod job;
