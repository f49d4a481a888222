//! Filesystem operations module.
//!
//! This module provides the low-level operations the engine is built on:
//! - Snapshotting a single path (`stat_path`)
//! - Collecting regular-file metadata under a root (`list_files`, `scan_pair`)
//! - Copying files with modification-time preservation
//! - Creating destination directories recursively

use std::fs;
use std::io;
use std::path::Path;
use std::thread;

use tracing::debug;

use crate::cancel::CancelToken;
use crate::config::IgnoreNames;
use crate::error::{panic_message, EngineError};
use crate::model::{FileMeta, MetaMap};

/// Snapshot a path, following symlinks.
///
/// Any stat failure (missing path, permission denied, vanished mid-scan)
/// yields `FileMeta::missing()`.
pub fn stat_path(path: &Path) -> FileMeta {
    match fs::metadata(path) {
        Ok(metadata) => FileMeta::from_metadata(&metadata),
        Err(e) => {
            if e.kind() != io::ErrorKind::NotFound {
                debug!("stat {} failed: {}", path.display(), e);
            }
            FileMeta::missing()
        }
    }
}

/// Collect metadata for every regular file under `root`.
///
/// Traversal uses an explicit stack. Entries whose name is in `ignore` are
/// neither descended into nor recorded; symlinks, devices and sockets are
/// skipped; unreadable directories and entries are skipped. A root that is
/// missing or not a directory yields an empty map.
///
/// `cancel` is polled before each directory and each entry; once set, the
/// map gathered so far is returned.
pub fn list_files(root: &Path, ignore: &IgnoreNames, cancel: &CancelToken) -> MetaMap {
    list_files_with(root, ignore, cancel, |_| {})
}

/// `list_files` with a callback invoked after each recorded file, receiving
/// its relative path.
pub(crate) fn list_files_with<F>(
    root: &Path,
    ignore: &IgnoreNames,
    cancel: &CancelToken,
    mut on_file: F,
) -> MetaMap
where
    F: FnMut(&Path),
{
    let mut out = MetaMap::new();

    match fs::metadata(root) {
        Ok(metadata) if metadata.is_dir() => {}
        _ => return out,
    }

    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        if cancel.is_cancelled() {
            break;
        }

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Skipping unreadable directory {}: {}", dir.display(), e);
                continue;
            }
        };

        // read_dir never yields "." or "..".
        for entry in entries {
            if cancel.is_cancelled() {
                debug!("Scan of {} cancelled after {} files", root.display(), out.len());
                return out;
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping unreadable entry in {}: {}", dir.display(), e);
                    continue;
                }
            };

            if ignore.contains(&entry.file_name()) {
                continue;
            }

            // file_type() does not follow symlinks, so links are neither
            // traversed nor recorded.
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(e) => {
                    debug!("Skipping {}: {}", entry.path().display(), e);
                    continue;
                }
            };

            let path = entry.path();
            if file_type.is_dir() {
                stack.push(path);
            } else if file_type.is_file() {
                let metadata = match entry.metadata() {
                    Ok(metadata) => metadata,
                    Err(e) => {
                        debug!("Skipping {}: {}", path.display(), e);
                        continue;
                    }
                };
                if let Ok(rel) = path.strip_prefix(root) {
                    out.insert(rel.to_path_buf(), FileMeta::from_metadata(&metadata));
                    on_file(rel);
                }
            }
        }
    }

    out
}

/// Collect both roots concurrently and join before returning.
///
/// The two scans share nothing but `ignore` and `cancel`, both read-only.
///
/// # Errors
/// Returns `EngineError::ScanAborted` if either scan thread panicked.
pub fn scan_pair(
    src_root: &Path,
    dst_root: &Path,
    ignore: &IgnoreNames,
    cancel: &CancelToken,
) -> Result<(MetaMap, MetaMap), EngineError> {
    thread::scope(|scope| {
        let src_scan = scope.spawn(|| list_files(src_root, ignore, cancel));
        let dst_scan = scope.spawn(|| list_files(dst_root, ignore, cancel));

        // Join both before inspecting either, so a panic on one side never
        // leaves the other unjoined.
        let src_result = src_scan.join();
        let dst_result = dst_scan.join();

        let src_map = src_result.map_err(|payload| EngineError::ScanAborted {
            path: src_root.to_path_buf(),
            message: panic_message(&*payload),
        })?;
        let dst_map = dst_result.map_err(|payload| EngineError::ScanAborted {
            path: dst_root.to_path_buf(),
            message: panic_message(&*payload),
        })?;

        Ok((src_map, dst_map))
    })
}

/// Copy a file from source to destination, preserving its modification time.
///
/// Existing destination content is truncated and overwritten. The parent
/// directory must already exist.
///
/// # Returns
/// Number of bytes copied
pub fn copy_file_with_metadata(src: &Path, dst: &Path) -> io::Result<u64> {
    let mut src_file = fs::File::open(src)?;
    let src_mtime = src_file.metadata()?.modified().ok();

    let mut dst_file = fs::File::create(dst)?;
    let bytes_copied = io::copy(&mut src_file, &mut dst_file)?;
    drop(dst_file);

    // Without this the destination would carry the copy time and look newer
    // than its source on the next compare.
    if let Some(mtime) = src_mtime {
        if let Err(e) = filetime::set_file_mtime(dst, filetime::FileTime::from_system_time(mtime)) {
            debug!("Could not preserve mtime on {}: {}", dst.display(), e);
        }
    }

    Ok(bytes_copied)
}

/// Ensure the parent directory of a path exists, creating it if necessary.
///
/// # Errors
/// Fails if the parent exists but is not a directory, or cannot be created.
pub fn ensure_parent_dir_exists(path: &Path) -> io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => return Ok(()),
    };

    match fs::metadata(parent) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} exists but is not a directory", parent.display()),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => fs::create_dir_all(parent),
        Err(e) => Err(e),
    }
}
