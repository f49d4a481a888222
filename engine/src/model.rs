//! Core data model for comparison runs.
//!
//! This module defines the structures exchanged between the scanner, the
//! diff pass, the worker and the copy pass:
//! - FileMeta: a metadata snapshot of one path, taken once and never mutated
//! - Action: the verdict for one relative path
//! - DiffItem: a classified relative path with both snapshots
//! - DiffSummary: per-action counts for an assessment

use std::collections::HashMap;
use std::fmt;
use std::fs::Metadata;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// Tolerance applied to modification-time comparisons, in seconds.
///
/// Absorbs timestamp-resolution differences between filesystems
/// (FAT keeps 2s, ext4 keeps nanoseconds, network shares vary).
pub const MTIME_EPSILON: f64 = 1.0;

/// Relative path (from the scanned root) to metadata snapshot.
pub type MetaMap = HashMap<PathBuf, FileMeta>;

/// Metadata snapshot of a single path.
///
/// A path that could not be stat'ed is represented as `exists == false`
/// with every other field at its default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    /// Whether the path existed when it was stat'ed
    pub exists: bool,

    /// True for regular files; false for directories and anything else
    pub is_file: bool,

    /// Size in bytes (0 unless `is_file`)
    pub size: u64,

    /// Last modification time, in seconds since the Unix epoch
    pub mtime: f64,
}

impl FileMeta {
    /// Snapshot for a path that does not exist (or could not be read).
    pub fn missing() -> Self {
        Self::default()
    }

    /// Build a snapshot from already-fetched filesystem metadata.
    pub fn from_metadata(metadata: &Metadata) -> Self {
        let is_file = metadata.is_file();
        let mtime = metadata
            .modified()
            .map(system_time_to_secs)
            .unwrap_or(0.0);

        FileMeta {
            exists: true,
            is_file,
            size: if is_file { metadata.len() } else { 0 },
            mtime,
        }
    }

    /// Local-time rendering of `mtime`, or "—" when the path is absent.
    pub fn mtime_display(&self) -> String {
        if !self.exists {
            return "—".to_string();
        }
        DateTime::<Utc>::from_timestamp(self.mtime.floor() as i64, 0)
            .map(|dt| {
                dt.with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string()
            })
            .unwrap_or_else(|| "—".to_string())
    }

    /// Size rendering for reports, or "—" when the path is absent.
    pub fn size_display(&self) -> String {
        if self.exists {
            self.size.to_string()
        } else {
            "—".to_string()
        }
    }
}

/// Convert a `SystemTime` into fractional seconds since the Unix epoch.
///
/// Times before the epoch come out negative.
pub fn system_time_to_secs(time: SystemTime) -> f64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(since) => since.as_secs_f64(),
        Err(before) => -before.duration().as_secs_f64(),
    }
}

/// Verdict for a single relative path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Same size, mtimes within epsilon
    Identical,
    /// Present in source only
    CopyNew,
    /// Source is newer than destination
    CopyNewer,
    /// Sizes differ but mtimes are too close to order
    CopyMismatch,
    /// Destination is newer; left alone
    SkipDestNewer,
    /// Present in destination only; reported, never removed
    OnlyInDest,
    /// One side is a regular file, the other is not
    TypeMismatch,
}

impl Action {
    /// Stable snake_case label used in reports and JSON output.
    pub fn label(&self) -> &'static str {
        match self {
            Action::Identical => "identical",
            Action::CopyNew => "copy_new",
            Action::CopyNewer => "copy_newer",
            Action::CopyMismatch => "copy_mismatch",
            Action::SkipDestNewer => "skip_dest_newer",
            Action::OnlyInDest => "only_in_dest",
            Action::TypeMismatch => "type_mismatch",
        }
    }

    /// Returns true if the copy pass acts on this verdict.
    pub fn is_copy(&self) -> bool {
        matches!(self, Action::CopyNew | Action::CopyNewer | Action::CopyMismatch)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One classified relative path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffItem {
    /// Path relative to both roots; unique within a batch
    pub relpath: PathBuf,

    /// Verdict derived from (`src`, `dst`)
    pub action: Action,

    /// Short human-readable explanation of the verdict
    pub reason: String,

    /// Source-side snapshot
    pub src: FileMeta,

    /// Destination-side snapshot
    pub dst: FileMeta,
}

impl DiffItem {
    pub fn new(
        relpath: impl Into<PathBuf>,
        action: Action,
        reason: impl Into<String>,
        src: FileMeta,
        dst: FileMeta,
    ) -> Self {
        DiffItem {
            relpath: relpath.into(),
            action,
            reason: reason.into(),
            src,
            dst,
        }
    }
}

/// Per-action counts over a diff batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub total: usize,
    /// CopyNew + CopyNewer + CopyMismatch
    pub to_copy: usize,
    pub dest_newer: usize,
    pub only_in_dest: usize,
    pub identical: usize,
    pub type_mismatch: usize,
}

impl DiffSummary {
    pub fn from_items(items: &[DiffItem]) -> Self {
        let mut summary = DiffSummary {
            total: items.len(),
            ..Default::default()
        };

        for item in items {
            match item.action {
                Action::CopyNew | Action::CopyNewer | Action::CopyMismatch => summary.to_copy += 1,
                Action::SkipDestNewer => summary.dest_newer += 1,
                Action::OnlyInDest => summary.only_in_dest += 1,
                Action::Identical => summary.identical += 1,
                Action::TypeMismatch => summary.type_mismatch += 1,
            }
        }

        summary
    }
}

impl fmt::Display for DiffSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Compared {} - copy:{} newer-dst:{} only-dst:{} identical:{} type-m:{}",
            self.total,
            self.to_copy,
            self.dest_newer,
            self.only_in_dest,
            self.identical,
            self.type_mismatch
        )
    }
}
