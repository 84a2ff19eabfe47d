// Copyright 2025 EcoCompute Contributors
// SPDX-License-Identifier: Apache-2.0

//! Source file discovery.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Directory names never descended into.
pub const SKIPPED_DIRS: [&str; 8] = [
    "venv",
    ".venv",
    "node_modules",
    "__pycache__",
    ".git",
    "test",
    "tests",
    "migrations",
];

/// Which files to collect.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Extensions to keep, without the leading dot.
    pub extensions: Vec<String>,
    /// Maximum number of files returned.
    pub max_files: usize,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            extensions: vec!["py".to_string()],
            max_files: 50,
        }
    }
}

impl DiscoveryOptions {
    fn wants(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.iter().any(|wanted| wanted == ext))
            .unwrap_or(false)
    }
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|name| SKIPPED_DIRS.contains(&name))
            .unwrap_or(false)
}

/// Collect source files from `roots`.
///
/// File roots are kept as given when their extension matches; directory
/// roots are walked recursively. The result is sorted, de-duplicated and
/// truncated to `max_files`. Missing roots and unreadable entries are
/// logged and skipped.
pub fn discover_files<P: AsRef<Path>>(roots: &[P], options: &DiscoveryOptions) -> Vec<PathBuf> {
    let mut found = BTreeSet::new();

    for root in roots {
        let root = root.as_ref();
        if root.is_file() {
            if options.wants(root) {
                found.insert(root.to_path_buf());
            }
            continue;
        }
        if !root.is_dir() {
            warn!(path = %root.display(), "Path does not exist, skipping");
            continue;
        }

        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| !is_skipped_dir(entry));

        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_file() && options.wants(entry.path()) => {
                    found.insert(entry.into_path());
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Skipping unreadable directory entry"),
            }
        }
    }

    let total = found.len();
    let files: Vec<PathBuf> = found.into_iter().take(options.max_files).collect();
    if total > files.len() {
        debug!(total, kept = files.len(), "Capped discovered files");
    }
    files
}
