// Copyright 2025 EcoCompute Contributors
// SPDX-License-Identifier: Apache-2.0

//! Throughput and power calibration.
//!
//! Calibration tries progressively weaker sources and stops at the first
//! one that yields data:
//!
//! 1. A timed matrix-multiply benchmark on the accelerator, sampling power
//!    after every iteration ([`CalibrationMethod::ComputeBenchmark`]).
//! 2. Power-only sampling at a fixed interval ([`CalibrationMethod::PowerSampling`]).
//! 3. The midpoint of the known TDP and idle draw ([`CalibrationMethod::Estimated`]).
//!
//! Nothing here returns an error to the caller: a machine that cannot be
//! measured yields a zeroed result with [`CalibrationMethod::None`].

use ecocompute_core::CalibrationSettings;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::thread;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{CalibrationError, Result};
use crate::hardware::HardwareProfile;
use crate::probe::GpuProbe;

/// Accelerator matrix-multiply runtime used by the compute benchmark.
#[cfg_attr(test, mockall::automock)]
pub trait ComputeRuntime {
    /// Short backend name for logs.
    fn name(&self) -> String;

    /// Allocate two `n x n` half-precision operands on the device.
    fn prepare(&mut self, matrix_size: usize) -> Result<()>;

    /// Run one multiply and block until the device has finished it.
    fn matmul(&mut self) -> Result<()>;

    /// Free device buffers.
    fn release(&mut self);
}

/// Runtime used when no accelerator compute backend is compiled in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoComputeRuntime;

impl ComputeRuntime for NoComputeRuntime {
    fn name(&self) -> String {
        "none".to_string()
    }

    fn prepare(&mut self, _matrix_size: usize) -> Result<()> {
        Err(CalibrationError::ComputeUnavailable(
            "no accelerator compute backend in this build".to_string(),
        ))
    }

    fn matmul(&mut self) -> Result<()> {
        Err(CalibrationError::ComputeUnavailable(
            "no accelerator compute backend in this build".to_string(),
        ))
    }

    fn release(&mut self) {}
}

/// How a [`CalibrationResult`] was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationMethod {
    /// Timed matmul benchmark with per-iteration power samples.
    ComputeBenchmark,
    /// Power sampling only, no throughput.
    PowerSampling,
    /// Power derived from the hardware table.
    Estimated,
    /// No data at all.
    #[default]
    None,
}

impl CalibrationMethod {
    /// Identifier used in reports and baseline records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ComputeBenchmark => "compute_benchmark",
            Self::PowerSampling => "power_sampling",
            Self::Estimated => "estimated",
            Self::None => "none",
        }
    }
}

impl fmt::Display for CalibrationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a calibration run. Zero means "not measured".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CalibrationResult {
    /// Sustained half-precision throughput in TFLOPS.
    pub benchmark_score_tflops: f64,
    /// Mean power draw in watts.
    pub avg_power_draw_w: f64,
    /// Watts per TFLOPS, i.e. joules per tera-operation.
    pub energy_per_tflop_joules: f64,
    /// Measured wall-clock time in seconds.
    pub duration_s: f64,
    /// Source of the numbers.
    pub method: CalibrationMethod,
}

impl CalibrationResult {
    /// Zeroed result tagged with `method`.
    pub fn empty(method: CalibrationMethod) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    /// Whether a throughput score was measured.
    pub fn has_throughput(&self) -> bool {
        self.benchmark_score_tflops > 0.0
    }

    /// Whether a power figure is available.
    pub fn has_power(&self) -> bool {
        self.avg_power_draw_w > 0.0
    }

    fn with_energy_per_tflop(mut self) -> Self {
        if self.has_throughput() && self.has_power() {
            self.energy_per_tflop_joules = self.avg_power_draw_w / self.benchmark_score_tflops;
        }
        self
    }
}

fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        0.0
    } else {
        samples.iter().sum::<f64>() / samples.len() as f64
    }
}

/// Timed matmul benchmark with power sampled after every iteration.
pub fn run_compute_benchmark(
    probe: &dyn GpuProbe,
    runtime: &mut dyn ComputeRuntime,
    settings: &CalibrationSettings,
) -> CalibrationResult {
    let empty = CalibrationResult::empty(CalibrationMethod::ComputeBenchmark);
    let n = settings.matrix_size;

    if let Err(e) = runtime.prepare(n) {
        debug!(runtime = %runtime.name(), error = %e, "Compute benchmark unavailable");
        return empty;
    }

    for _ in 0..settings.warmup_iterations {
        if let Err(e) = runtime.matmul() {
            warn!(error = %e, "Compute benchmark warm-up failed");
            runtime.release();
            return empty;
        }
    }

    let flops_per_iteration = 2.0 * (n as f64).powi(3);
    let budget = settings.benchmark_duration();
    let mut total_flops = 0.0;
    let mut power_samples = Vec::new();

    let start = Instant::now();
    while start.elapsed() < budget {
        if let Err(e) = runtime.matmul() {
            warn!(error = %e, "Compute benchmark aborted");
            runtime.release();
            return empty;
        }
        total_flops += flops_per_iteration;
        if let Some(watts) = probe.power_draw_w() {
            power_samples.push(watts);
        }
    }
    let elapsed = start.elapsed().as_secs_f64();
    runtime.release();

    let benchmark_score_tflops = if elapsed > 0.0 {
        total_flops / elapsed / 1e12
    } else {
        0.0
    };

    CalibrationResult {
        benchmark_score_tflops,
        avg_power_draw_w: mean(&power_samples),
        duration_s: elapsed,
        ..empty
    }
    .with_energy_per_tflop()
}

/// Sample power at a fixed interval without running any workload.
pub fn run_power_sampling(probe: &dyn GpuProbe, settings: &CalibrationSettings) -> CalibrationResult {
    let budget = settings.power_sampling_duration();
    let interval = settings.sampling_interval();
    let mut samples = Vec::new();

    let start = Instant::now();
    while start.elapsed() < budget {
        if let Some(watts) = probe.power_draw_w() {
            samples.push(watts);
        }
        thread::sleep(interval);
    }

    let mut result = CalibrationResult::empty(CalibrationMethod::PowerSampling);
    if !samples.is_empty() {
        result.avg_power_draw_w = mean(&samples);
        result.duration_s = start.elapsed().as_secs_f64();
    }
    result
}

/// Calibrate the machine described by `hardware`.
pub fn calibrate(
    hardware: &HardwareProfile,
    probe: &dyn GpuProbe,
    runtime: &mut dyn ComputeRuntime,
    settings: &CalibrationSettings,
) -> CalibrationResult {
    if !hardware.has_gpu() {
        info!("No GPU detected, skipping calibration");
        return CalibrationResult::empty(CalibrationMethod::Estimated);
    }

    let result = run_compute_benchmark(probe, runtime, settings);
    if result.has_throughput() {
        info!(
            tflops = result.benchmark_score_tflops,
            watts = result.avg_power_draw_w,
            "Compute benchmark complete"
        );
        return result;
    }

    let result = run_power_sampling(probe, settings);
    if result.has_power() {
        info!(watts = result.avg_power_draw_w, "Power sampling complete");
        return result;
    }

    if hardware.known {
        let midpoint =
            (hardware.thermal_design_power_w as f64 + hardware.idle_power_w as f64) / 2.0;
        info!(watts = midpoint, "Using table power estimate");
        return CalibrationResult {
            avg_power_draw_w: midpoint,
            ..CalibrationResult::empty(CalibrationMethod::Estimated)
        };
    }

    warn!(gpu = %hardware.display_name, "Calibration produced no data");
    CalibrationResult::empty(CalibrationMethod::None)
}
