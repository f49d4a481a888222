//! Error types for the comparison engine.
//!
//! `EngineError` represents run-level failures: the compare pass could not
//! produce a result at all. Per-item copy failures are recorded as
//! `CopyError` values in the apply report and never abort a batch. Stat
//! failures during scanning are not errors; the path is treated as missing.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Errors that end a run (or a configuration load) as a whole.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A metadata collection thread panicked before returning its map
    #[error("Scan of {} aborted: {message}", .path.display())]
    ScanAborted { path: PathBuf, message: String },

    /// The compare pass panicked
    #[error("Compare pass panicked: {message}")]
    WorkerPanicked { message: String },

    /// Operation not allowed in the worker's current state
    #[error("Invalid worker state: {message}")]
    InvalidState { message: String },

    /// Configuration file could not be read or parsed
    #[error("Invalid configuration {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },
}

/// A single failed item in the copy pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyError {
    /// Relative path of the item that failed
    pub relpath: PathBuf,

    /// Human-readable failure description
    pub message: String,
}

impl fmt::Display for CopyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.relpath.display(), self.message)
    }
}

/// Extract a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
