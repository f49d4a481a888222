//! Classification of source/destination pairs.
//!
//! Size and modification time are the only signals; file contents are
//! never read. `classify` is a pure function of the two snapshots, so the
//! same pair always yields the same verdict.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::config::IgnoreNames;
use crate::error::EngineError;
use crate::fs_ops;
use crate::model::{Action, DiffItem, FileMeta, MetaMap, MTIME_EPSILON};

/// Classify a pair of snapshots.
///
/// Rules are applied in order; the first match wins:
/// 1. both absent: `Identical` (degenerate, only reachable via `compare_files`)
/// 2. source only: `CopyNew`
/// 3. destination only: `OnlyInDest`
/// 4. either side not a regular file: `TypeMismatch`
/// 5. equal size and mtimes within epsilon: `Identical`
/// 6. source newer by more than epsilon: `CopyNewer`
/// 7. destination newer by more than epsilon: `SkipDestNewer`
/// 8. otherwise (sizes differ, mtimes within epsilon): `CopyMismatch`
pub fn classify(src: &FileMeta, dst: &FileMeta) -> (Action, &'static str) {
    match (src.exists, dst.exists) {
        (false, false) => return (Action::Identical, "Both missing"),
        (true, false) => return (Action::CopyNew, "Missing in destination"),
        (false, true) => return (Action::OnlyInDest, "Only in destination"),
        (true, true) => {}
    }

    if !(src.is_file && dst.is_file) {
        return (Action::TypeMismatch, "Different type");
    }

    if src.size == dst.size && (src.mtime - dst.mtime).abs() <= MTIME_EPSILON {
        (Action::Identical, "Size/time match")
    } else if src.mtime > dst.mtime + MTIME_EPSILON {
        (Action::CopyNewer, "Source newer")
    } else if dst.mtime > src.mtime + MTIME_EPSILON {
        (Action::SkipDestNewer, "Destination newer")
    } else {
        (Action::CopyMismatch, "Ambiguous difference")
    }
}

/// Stat two paths independently and classify them.
///
/// The item's `relpath` is the source's file name; tree comparisons
/// overwrite it with the key being compared.
pub fn compare_files(src: &Path, dst: &Path) -> DiffItem {
    let src_meta = fs_ops::stat_path(src);
    let dst_meta = fs_ops::stat_path(dst);
    let (action, reason) = classify(&src_meta, &dst_meta);

    let relpath = src.file_name().map(PathBuf::from).unwrap_or_default();
    DiffItem::new(relpath, action, reason, src_meta, dst_meta)
}

/// Union of the relative paths seen on either side, in sorted order.
pub fn merged_keys<'a>(src_map: &'a MetaMap, dst_map: &'a MetaMap) -> Vec<&'a PathBuf> {
    let keys: BTreeSet<&PathBuf> = src_map.keys().chain(dst_map.keys()).collect();
    keys.into_iter().collect()
}

/// Classify one key of a tree comparison.
///
/// One-sided keys are decided from the scan snapshot; keys present on both
/// sides are re-stat'ed through `compare_files`, so a file removed after the
/// scan shows up as missing rather than with stale metadata.
pub fn diff_key(
    relpath: &Path,
    src_root: &Path,
    dst_root: &Path,
    src_map: &MetaMap,
    dst_map: &MetaMap,
) -> DiffItem {
    match (src_map.get(relpath), dst_map.get(relpath)) {
        (Some(src), None) => DiffItem::new(
            relpath,
            Action::CopyNew,
            "Missing in dest",
            *src,
            FileMeta::missing(),
        ),
        (None, Some(dst)) => DiffItem::new(
            relpath,
            Action::OnlyInDest,
            "Only in dest",
            FileMeta::missing(),
            *dst,
        ),
        _ => {
            let mut item = compare_files(&src_root.join(relpath), &dst_root.join(relpath));
            item.relpath = relpath.to_path_buf();
            item
        }
    }
}

/// Classify `keys` in order, calling `on_item` with the running count after
/// each one.
///
/// Stops at the first item boundary where `cancel` is set and returns what
/// has been classified so far.
pub fn diff_keys<F>(
    keys: &[&PathBuf],
    src_root: &Path,
    dst_root: &Path,
    src_map: &MetaMap,
    dst_map: &MetaMap,
    cancel: &CancelToken,
    mut on_item: F,
) -> Vec<DiffItem>
where
    F: FnMut(usize),
{
    let mut diffs = Vec::with_capacity(keys.len());
    for relpath in keys {
        if cancel.is_cancelled() {
            debug!("Compare cancelled after {} of {} items", diffs.len(), keys.len());
            break;
        }
        diffs.push(diff_key(relpath, src_root, dst_root, src_map, dst_map));
        on_item(diffs.len());
    }
    diffs
}

/// Compare two directory trees.
///
/// Both roots are scanned concurrently, then every key in the union is
/// classified. Cancellation returns the partial result rather than an error.
///
/// # Errors
/// Returns `EngineError::ScanAborted` if a scan thread panicked.
pub fn compare_dirs(
    src_root: &Path,
    dst_root: &Path,
    ignore: &IgnoreNames,
    cancel: &CancelToken,
) -> Result<Vec<DiffItem>, EngineError> {
    let (src_map, dst_map) = fs_ops::scan_pair(src_root, dst_root, ignore, cancel)?;
    let keys = merged_keys(&src_map, &dst_map);
    info!(
        "Scanned {} source and {} destination files ({} distinct paths)",
        src_map.len(),
        dst_map.len(),
        keys.len()
    );

    Ok(diff_keys(&keys, src_root, dst_root, &src_map, &dst_map, cancel, |_| {}))
}
