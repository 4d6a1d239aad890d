//! Data Transfer Objects for the HTTP API
//!
//! Bodies returned by the server and decoded by the client.

pub mod job;
