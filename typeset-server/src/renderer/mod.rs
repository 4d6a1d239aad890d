//! Renderer Module
//!
//! Turns accepted jobs into terminal statuses: the invoker runs the engine
//! for one job, the pool bounds how many run at once.

pub mod invoker;
pub mod pool;

pub use invoker::{EngineOutcome, RenderError, RenderInvoker};
pub use pool::{RenderPool, ScheduleError};

/// Write an executable shell script standing in for the rendering engine
#[cfg(all(test, unix))]
pub(crate) fn fake_engine(dir: &std::path::Path, name: &str, body: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}
