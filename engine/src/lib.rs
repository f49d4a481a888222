//! # Aequalis Engine - One-way Compare & Sync Library
//!
//! A headless engine that decides, per relative path, whether a destination
//! tree needs a copy from a source tree, using file size and modification
//! time only. Designed as the foundation for multiple front ends (CLI, GUI,
//! automation).
//!
//! ## Overview
//!
//! - Concurrent metadata collection of both roots, with an ignore-name set
//! - Pure size/mtime classification with a 1-second tolerance
//! - A cancellable background worker that reports phases and progress
//!   through an event sink (decoupled from UI technology)
//! - A copy pass that applies a diff set, isolating per-item errors
//!
//! ## Basic Usage
//!
//! ```no_run
//! use engine::{apply_diffs, CancelToken, CompareConfig, CompareRequest, SyncWorker, WorkerEvent};
//!
//! let ignore = CompareConfig::default().ignore_names();
//! let handle = SyncWorker::new(CompareRequest::tree("/data/src", "/backup/dst", ignore)).spawn();
//!
//! let mut diffs = Vec::new();
//! for event in handle.events().iter() {
//!     match event {
//!         WorkerEvent::Phase(label) => println!("{label}"),
//!         WorkerEvent::Done(items) => {
//!             diffs = items;
//!             break;
//!         }
//!         WorkerEvent::Failed(message) => {
//!             eprintln!("{message}");
//!             break;
//!         }
//!         _ => {}
//!     }
//! }
//!
//! let report = apply_diffs(
//!     "/data/src".as_ref(),
//!     "/backup/dst".as_ref(),
//!     &diffs,
//!     &CancelToken::new(),
//!     None,
//! );
//! println!("copied {} with {} errors", report.copied, report.errors.len());
//! ```
//!
//! ## Modules
//!
//! - **model**: Core data structures (FileMeta, Action, DiffItem, DiffSummary)
//! - **error**: Run-level errors and per-item copy errors
//! - **cancel**: Shared cancellation token
//! - **config**: Ignore-name configuration
//! - **fs_ops**: Stat, metadata collection and copy primitives
//! - **diff**: Pair and tree classification
//! - **progress**: Worker events and the sink trait
//! - **worker**: The background compare state machine
//! - **apply**: The copy pass

pub mod model;
pub mod error;
pub mod cancel;
pub mod config;
pub mod fs_ops;
pub mod diff;
pub mod progress;
pub mod worker;
pub mod apply;

// Re-export main types and functions
pub use model::{Action, DiffItem, DiffSummary, FileMeta, MetaMap, MTIME_EPSILON};
pub use error::{CopyError, EngineError};
pub use cancel::CancelToken;
pub use config::{CompareConfig, IgnoreNames, HEAVY_DIR_NAMES};
pub use fs_ops::list_files;
pub use diff::{classify, compare_dirs, compare_files};
pub use progress::{EventSink, WorkerEvent};
pub use worker::{CompareMode, CompareRequest, SyncWorker, WorkerHandle, WorkerState};
pub use apply::{apply_diffs, eligible_count, ApplyReport};
