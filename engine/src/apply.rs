//! Copy pass.
//!
//! Applies a previously computed diff set: every `CopyNew`, `CopyNewer`
//! and `CopyMismatch` item is copied from the source root to the
//! destination root, in input order. Other actions are no-ops; in
//! particular destination-only files are never deleted.

use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::cancel::CancelToken;
use crate::error::CopyError;
use crate::fs_ops;
use crate::model::DiffItem;
use crate::progress::{EventSink, WorkerEvent, PHASE_COPYING};

/// Outcome of a copy pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    /// Items copied successfully
    pub copied: usize,

    /// Items that failed, in the order they were attempted
    pub errors: Vec<CopyError>,

    /// True if the pass stopped early on cancellation
    pub cancelled: bool,
}

impl ApplyReport {
    /// Every eligible item was attempted and none failed.
    pub fn is_success(&self) -> bool {
        !self.cancelled && self.errors.is_empty()
    }
}

/// Number of items the copy pass would act on.
pub fn eligible_count(diffs: &[DiffItem]) -> usize {
    diffs.iter().filter(|d| d.action.is_copy()).count()
}

/// Copy every eligible item from `src_root` to `dst_root`.
///
/// Missing destination directories are created. A failure on one item is
/// recorded and the pass moves on to the next. `cancel` is checked before
/// each item; a cancelled pass returns what it has done so far.
///
/// If `progress` is given it receives a `Copying…` phase, a range of
/// `[0, eligible]` and a value after each attempted item.
pub fn apply_diffs(
    src_root: &Path,
    dst_root: &Path,
    diffs: &[DiffItem],
    cancel: &CancelToken,
    progress: Option<&dyn EventSink>,
) -> ApplyReport {
    let mut report = ApplyReport::default();
    let total = eligible_count(diffs);

    if let Some(sink) = progress {
        sink.emit(WorkerEvent::Phase(PHASE_COPYING.to_string()));
        sink.emit(WorkerEvent::ProgressRange {
            min: 0,
            max: total as u64,
        });
    }

    let mut attempted: u64 = 0;
    for item in diffs.iter().filter(|d| d.action.is_copy()) {
        if cancel.is_cancelled() {
            report.cancelled = true;
            break;
        }

        let src = src_root.join(&item.relpath);
        let dst = dst_root.join(&item.relpath);

        let result = fs_ops::ensure_parent_dir_exists(&dst)
            .map_err(|e| format!("Failed to create directory: {e}"))
            .and_then(|()| {
                fs_ops::copy_file_with_metadata(&src, &dst).map_err(|e| format!("Failed to copy: {e}"))
            });

        match result {
            Ok(_) => report.copied += 1,
            Err(message) => {
                warn!("{}: {}", item.relpath.display(), message);
                report.errors.push(CopyError {
                    relpath: item.relpath.clone(),
                    message,
                });
            }
        }

        attempted += 1;
        if let Some(sink) = progress {
            sink.emit(WorkerEvent::ProgressValue(attempted));
        }
    }

    info!(
        "Copy pass: {} of {} copied, {} errors{}",
        report.copied,
        total,
        report.errors.len(),
        if report.cancelled { " (cancelled)" } else { "" }
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IgnoreNames;
    use crate::diff::compare_dirs;
    use crate::model::{Action, FileMeta};
    use filetime::{set_file_mtime, FileTime};
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Mutex;

    const T: i64 = 1_700_000_000;

    fn write_with_mtime(path: &Path, contents: &[u8], secs: i64) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        fs::write(path, contents).expect("Failed to write file");
        set_file_mtime(path, FileTime::from_unix_time(secs, 0)).expect("Failed to set mtime");
    }

    fn item(relpath: &str, action: Action) -> DiffItem {
        DiffItem::new(relpath, action, "test", FileMeta::missing(), FileMeta::missing())
    }

    struct CountingSink {
        events: Mutex<Vec<WorkerEvent>>,
    }

    impl EventSink for CountingSink {
        fn emit(&self, event: WorkerEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[test]
    fn test_apply_copies_only_eligible_actions() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        let dst = temp_dir.path().join("dst");
        for name in ["new.txt", "newer.txt", "mismatch.txt", "same.txt", "older.txt"] {
            write_with_mtime(&src.join(name), b"source", T);
        }
        write_with_mtime(&dst.join("older.txt"), b"dest", T + 100);
        write_with_mtime(&dst.join("only.txt"), b"keep me", T);

        let diffs = vec![
            item("new.txt", Action::CopyNew),
            item("newer.txt", Action::CopyNewer),
            item("mismatch.txt", Action::CopyMismatch),
            item("same.txt", Action::Identical),
            item("older.txt", Action::SkipDestNewer),
            item("only.txt", Action::OnlyInDest),
        ];
        assert_eq!(eligible_count(&diffs), 3);

        let report = apply_diffs(&src, &dst, &diffs, &CancelToken::new(), None);

        assert_eq!(report.copied, 3);
        assert!(report.is_success());
        assert!(dst.join("new.txt").exists());
        assert!(dst.join("newer.txt").exists());
        assert!(dst.join("mismatch.txt").exists());
        assert!(!dst.join("same.txt").exists());
        assert_eq!(fs::read(dst.join("older.txt")).expect("Failed to read"), b"dest");
        assert_eq!(fs::read(dst.join("only.txt")).expect("Failed to read"), b"keep me");
    }

    #[test]
    fn test_apply_creates_nested_destination_dirs() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        let dst = temp_dir.path().join("dst");
        write_with_mtime(&src.join("a").join("b").join("c.txt"), b"deep", T);

        let diffs = vec![item("a/b/c.txt", Action::CopyNew)];
        let report = apply_diffs(&src, &dst, &diffs, &CancelToken::new(), None);

        assert!(report.is_success());
        assert_eq!(
            fs::read(dst.join("a").join("b").join("c.txt")).expect("Failed to read"),
            b"deep"
        );
    }

    #[test]
    fn test_apply_continues_after_item_error() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        let dst = temp_dir.path().join("dst");
        write_with_mtime(&src.join("first.txt"), b"1", T);
        write_with_mtime(&src.join("third.txt"), b"3", T);
        fs::create_dir_all(&dst).expect("Failed to create dst");

        let diffs = vec![
            item("first.txt", Action::CopyNew),
            item("vanished.txt", Action::CopyNew),
            item("third.txt", Action::CopyNew),
        ];
        let report = apply_diffs(&src, &dst, &diffs, &CancelToken::new(), None);

        assert_eq!(report.copied, 2);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].relpath, PathBuf::from("vanished.txt"));
        assert!(report.errors[0].message.starts_with("Failed to copy"));
        assert!(!report.is_success());
        assert!(dst.join("third.txt").exists());
    }

    #[test]
    fn test_apply_records_mkdir_failure() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        let dst = temp_dir.path().join("dst");
        write_with_mtime(&src.join("sub").join("x.txt"), b"x", T);
        // A file where the destination directory should go
        write_with_mtime(&dst.join("sub"), b"blocker", T);

        let diffs = vec![item("sub/x.txt", Action::CopyNew)];
        let report = apply_diffs(&src, &dst, &diffs, &CancelToken::new(), None);

        assert_eq!(report.copied, 0);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].message.starts_with("Failed to create directory"));
    }

    #[test]
    fn test_apply_cancelled_is_partial_but_not_error() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        let dst = temp_dir.path().join("dst");
        write_with_mtime(&src.join("a.txt"), b"a", T);

        let cancel = CancelToken::new();
        cancel.cancel();
        let diffs = vec![item("a.txt", Action::CopyNew)];
        let report = apply_diffs(&src, &dst, &diffs, &cancel, None);

        assert_eq!(report.copied, 0);
        assert!(report.errors.is_empty());
        assert!(report.cancelled);
        assert!(!report.is_success());
        assert!(!dst.join("a.txt").exists());
    }

    #[test]
    fn test_apply_emits_progress() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        let dst = temp_dir.path().join("dst");
        write_with_mtime(&src.join("a.txt"), b"a", T);
        write_with_mtime(&src.join("b.txt"), b"b", T);

        let diffs = vec![
            item("a.txt", Action::CopyNew),
            item("skip.txt", Action::Identical),
            item("b.txt", Action::CopyNewer),
        ];
        let sink = CountingSink {
            events: Mutex::new(Vec::new()),
        };
        apply_diffs(&src, &dst, &diffs, &CancelToken::new(), Some(&sink));

        let events = sink.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                WorkerEvent::Phase(PHASE_COPYING.to_string()),
                WorkerEvent::ProgressRange { min: 0, max: 2 },
                WorkerEvent::ProgressValue(1),
                WorkerEvent::ProgressValue(2),
            ]
        );
    }

    #[test]
    fn test_round_trip_compare_apply_compare() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        let dst = temp_dir.path().join("dst");
        write_with_mtime(&src.join("new.txt"), b"brand new", T);
        write_with_mtime(&src.join("dir").join("newer.txt"), b"updated", T + 120);
        write_with_mtime(&dst.join("dir").join("newer.txt"), b"stale", T);
        write_with_mtime(&src.join("mismatch.txt"), b"12345", T);
        write_with_mtime(&dst.join("mismatch.txt"), b"1234567", T);
        write_with_mtime(&dst.join("only.txt"), b"dest only", T);

        let ignore = IgnoreNames::none();
        let before = compare_dirs(&src, &dst, &ignore, &CancelToken::new()).expect("Compare failed");
        assert_eq!(eligible_count(&before), 3);

        let report = apply_diffs(&src, &dst, &before, &CancelToken::new(), None);
        assert!(report.is_success());
        assert_eq!(report.copied, 3);

        let after = compare_dirs(&src, &dst, &ignore, &CancelToken::new()).expect("Compare failed");
        assert_eq!(after.len(), before.len());
        for diff in &after {
            if diff.relpath == Path::new("only.txt") {
                assert_eq!(diff.action, Action::OnlyInDest);
            } else {
                assert!(
                    matches!(diff.action, Action::Identical | Action::SkipDestNewer),
                    "{} still {:?} after copy",
                    diff.relpath.display(),
                    diff.action
                );
            }
        }
    }
}
