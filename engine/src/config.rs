//! Ignore-name configuration.
//!
//! `CompareConfig` is the serializable form (loaded from a JSON file or
//! built from CLI flags); `IgnoreNames` is the resolved set the scanner
//! consults for every directory entry.

use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Directory names skipped when `skip_heavy_dirs` is enabled.
pub const HEAVY_DIR_NAMES: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".idea",
    ".vscode",
    "node_modules",
    "__pycache__",
    "dist",
    "build",
];

/// Comparison settings supplied by the front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareConfig {
    /// Include `HEAVY_DIR_NAMES` in the ignore set
    #[serde(default = "default_skip_heavy_dirs")]
    pub skip_heavy_dirs: bool,

    /// Additional entry names to skip
    #[serde(default)]
    pub extra_ignores: Vec<String>,
}

fn default_skip_heavy_dirs() -> bool {
    true
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            skip_heavy_dirs: default_skip_heavy_dirs(),
            extra_ignores: Vec::new(),
        }
    }
}

impl CompareConfig {
    /// Load settings from a JSON file.
    ///
    /// A missing file yields the defaults; unreadable or malformed files
    /// are reported as `EngineError::Config`.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(EngineError::Config {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })
            }
        };

        serde_json::from_str(&content).map_err(|e| EngineError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Resolve the effective ignore set.
    pub fn ignore_names(&self) -> IgnoreNames {
        let mut names = if self.skip_heavy_dirs {
            IgnoreNames::heavy_defaults()
        } else {
            IgnoreNames::none()
        };
        for name in &self.extra_ignores {
            names.insert(name.clone());
        }
        names
    }
}

/// Exact entry names the scanner neither descends into nor records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreNames {
    names: BTreeSet<String>,
}

impl IgnoreNames {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn heavy_defaults() -> Self {
        HEAVY_DIR_NAMES.iter().copied().collect()
    }

    pub fn insert(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    /// Returns true if an entry with this file name must be skipped.
    pub fn contains(&self, name: &OsStr) -> bool {
        name.to_str().map_or(false, |n| self.names.contains(n))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for IgnoreNames {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        IgnoreNames {
            names: iter.into_iter().map(Into::into).collect(),
        }
    }
}
