//! Typeset Server
//!
//! Accepts LaTeX document bundles over HTTP, renders them in the background
//! with an external engine and serves the resulting PDFs.

pub mod api;
pub mod config;
pub mod db;
pub mod renderer;
pub mod repository;
pub mod service;
pub mod state;
pub mod storage;
