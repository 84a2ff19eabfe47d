// Copyright 2025 EcoCompute Contributors
// SPDX-License-Identifier: Apache-2.0

//! Audit error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while collecting or rendering an audit.
///
/// None of these abort a scan: unreadable files and walk failures are
/// logged and skipped by the engine.
#[derive(Debug, Error)]
pub enum AuditError {
    /// A source file could not be read.
    #[error("Failed to read {path}: {source}")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Directory traversal failed for one entry.
    #[error("Failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),

    /// Report serialization failed.
    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type for audit operations.
pub type Result<T> = std::result::Result<T, AuditError>;
