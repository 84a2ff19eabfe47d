// Copyright 2025 EcoCompute Contributors
// SPDX-License-Identifier: Apache-2.0

//! Calibration and baseline error types.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by probes and compute runtimes.
///
/// Probe and compute errors are recovered locally by the calibration code
/// and only show up in debug logs.
#[derive(Debug, Error)]
pub enum CalibrationError {
    /// The probe binary could not be started.
    #[error("Probe '{command}' unavailable: {source}")]
    ProbeUnavailable {
        /// Command that failed to start.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The probe exited unsuccessfully.
    #[error("Probe '{command}' exited with {status}")]
    ProbeFailed {
        /// Command that failed.
        command: String,
        /// Exit status description.
        status: String,
    },

    /// The probe did not finish in time and was killed.
    #[error("Probe '{command}' timed out after {timeout:?}")]
    ProbeTimeout {
        /// Command that hung.
        command: String,
        /// Timeout that was exceeded.
        timeout: Duration,
    },

    /// The probe output could not be parsed.
    #[error("Unparsable probe output: {0}")]
    ProbeOutput(String),

    /// No accelerator compute runtime is available.
    #[error("Compute runtime unavailable: {0}")]
    ComputeUnavailable(String),

    /// The compute runtime failed mid-benchmark.
    #[error("Compute runtime error: {0}")]
    Compute(String),
}

/// Errors raised by the baseline store.
#[derive(Debug, Error)]
pub enum BaselineError {
    /// Reading or writing the document failed.
    #[error("Baseline I/O error at {path}: {source}")]
    Io {
        /// Document or directory path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid JSON or has the wrong shape.
    #[error("Malformed baseline document: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The document root is not an object.
    #[error("Malformed baseline document: root must be an object")]
    NotAnObject,

    /// Atomically replacing the document failed.
    #[error("Failed to replace baseline document {path}: {source}")]
    Persist {
        /// Target path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type for calibration operations.
pub type Result<T> = std::result::Result<T, CalibrationError>;
