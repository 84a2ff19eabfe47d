// Copyright 2025 EcoCompute Contributors
// SPDX-License-Identifier: Apache-2.0

//! Shared types for the EcoCompute energy audit.
//!
//! This crate holds the vocabulary every other EcoCompute crate speaks:
//!
//! - [`severity`] - The closed `Severity` scale used for findings and thresholds
//! - [`finding`] - The immutable `Finding` record produced by audit rules
//! - [`config`] - Layered runtime `Settings` (defaults, TOML file, environment)

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod config;
pub mod finding;
pub mod severity;

pub use config::{AuditSettings, BaselineSettings, CalibrationSettings, ConfigError, Settings};
pub use finding::{Finding, SourceLocation};
pub use severity::{ParseSeverityError, Severity, SeverityCounts};
