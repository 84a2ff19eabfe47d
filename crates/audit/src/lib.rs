// Copyright 2025 EcoCompute Contributors
// SPDX-License-Identifier: Apache-2.0

//! Static energy-waste audit for LLM model-loading code.
//!
//! This crate scans source files for quantization and generation patterns
//! that are known, from measurements, to waste GPU energy.
//!
//! # Quick Start
//!
//! ```no_run
//! use ecocompute_audit::{discover_files, run_audit, DiscoveryOptions};
//! use ecocompute_core::Severity;
//!
//! let files = discover_files(&["src"], &DiscoveryOptions::default());
//! let report = run_audit(&files, Severity::Warning);
//!
//! for finding in &report.findings {
//!     println!("{}: {}", finding.location(), finding.title());
//! }
//! ```
//!
//! # Modules
//!
//! - [`rules`] - The `Rule` trait and the six built-in rules
//! - [`engine`] - Keyword prescan and the `AuditEngine`
//! - [`aggregate`] - Threshold filtering and ordering
//! - [`discover`] - Source file discovery
//! - [`markdown`] - Report rendering

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod aggregate;
pub mod discover;
pub mod engine;
pub mod error;
pub mod markdown;
pub mod rules;

pub use aggregate::aggregate;
pub use discover::{discover_files, DiscoveryOptions};
pub use engine::{needs_scan, run_audit, AuditEngine, AuditReport};
pub use error::{AuditError, Result};
pub use rules::{all_rules, Rule};
