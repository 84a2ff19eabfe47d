// Copyright 2025 EcoCompute Contributors
// SPDX-License-Identifier: Apache-2.0

//! GPU detection, calibration, energy estimation and regression gating.
//!
//! # Quick Start
//!
//! ```no_run
//! use ecocompute_calibration::{
//!     calibrate, compare_with_store, BaselineStore, HardwareProfile, NoComputeRuntime,
//!     NvidiaSmiProbe, RegressionPolicy, RunSummary,
//! };
//! use ecocompute_core::CalibrationSettings;
//!
//! let probe = NvidiaSmiProbe::default();
//! let hardware = HardwareProfile::detect(&probe);
//! let calibration = calibrate(
//!     &hardware,
//!     &probe,
//!     &mut NoComputeRuntime,
//!     &CalibrationSettings::default(),
//! );
//!
//! let store = BaselineStore::new(".ecocompute/baseline.json");
//! let comparison = compare_with_store(
//!     &store,
//!     &hardware,
//!     &RunSummary::default(),
//!     &calibration,
//!     &RegressionPolicy::default(),
//! );
//! println!("{}", comparison.change.reason);
//! ```
//!
//! # Modules
//!
//! - [`probe`] - `nvidia-smi` probing behind the `GpuProbe` trait
//! - [`hardware`] - Known-GPU table and `HardwareProfile` resolution
//! - [`calibrate`] - Benchmark, power sampling and table fallbacks
//! - [`estimate`] - Reference-data energy estimates
//! - [`baseline`] - JSON baseline store
//! - [`regression`] - Pass/fail gate against a baseline
//! - [`markdown`] - Report sections

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod baseline;
pub mod calibrate;
pub mod error;
pub mod estimate;
pub mod hardware;
pub mod markdown;
pub mod probe;
pub mod regression;

pub use baseline::{Baseline, BaselineDocument, BaselineStore};
pub use calibrate::{
    calibrate, CalibrationMethod, CalibrationResult, ComputeRuntime, NoComputeRuntime,
};
pub use error::{BaselineError, CalibrationError, Result};
pub use estimate::{estimate_energy, Confidence, EnergyEstimate, Quantization};
pub use hardware::{Architecture, HardwareProfile, KnownGpu, KNOWN_GPUS};
pub use probe::{GpuProbe, GpuQuery, NvidiaSmiProbe};
pub use regression::{
    classify, compare_with_store, Comparison, RegressionPolicy, RelativeChange, RunSummary,
};
