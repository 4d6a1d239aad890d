//! Typeset Core
//!
//! Core types shared by the Typeset rendering service and its clients.
//!
//! This crate contains:
//! - Domain types: job identity and the job status state machine
//! - DTOs: request/response bodies exchanged over the HTTP API

pub mod domain;
pub mod dto;
