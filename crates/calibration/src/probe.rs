// Copyright 2025 EcoCompute Contributors
// SPDX-License-Identifier: Apache-2.0

//! GPU information and power probes.
//!
//! The [`GpuProbe`] trait is the seam between calibration logic and the
//! machine. [`NvidiaSmiProbe`] implements it by shelling out to
//! `nvidia-smi` (and `nvcc` for the toolkit fallback), with a timeout on
//! every invocation so a hung driver cannot stall a run.

use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::{CalibrationError, Result};

/// Raw answer of the GPU information probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuQuery {
    /// Marketing name, e.g. `NVIDIA GeForce RTX 4090`.
    pub name: String,
    /// Driver version string.
    pub driver_version: String,
    /// Total memory of the first device, in MiB.
    pub vram_total_mb: u64,
    /// Number of devices reported.
    pub count: u32,
}

/// Source of GPU facts and power readings.
///
/// Every method degrades to `None` on any failure.
#[cfg_attr(test, mockall::automock)]
pub trait GpuProbe {
    /// Name, driver, memory and device count, or `None` if no GPU answers.
    fn query_gpu(&self) -> Option<GpuQuery>;

    /// Compute-toolkit (CUDA) version from the primary source.
    fn toolkit_version(&self) -> Option<String>;

    /// Compute-toolkit version from the secondary source.
    fn toolkit_version_fallback(&self) -> Option<String>;

    /// Instantaneous power draw in watts.
    fn power_draw_w(&self) -> Option<f64>;
}

static CUDA_BANNER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"CUDA Version:\s*([\d.]+)").expect("static probe pattern must compile"));

static NVCC_RELEASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"release\s+([\d.]+)").expect("static probe pattern must compile"));

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Run `program args...`, returning stdout if it exits successfully within `timeout`.
pub fn run_with_timeout(program: &str, args: &[&str], timeout: Duration) -> Result<String> {
    let command = format!("{} {}", program, args.join(" ")).trim().to_string();

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| CalibrationError::ProbeUnavailable {
            command: command.clone(),
            source,
        })?;

    let reader = child.stdout.take().map(|mut pipe| {
        thread::spawn(move || {
            let mut stdout = String::new();
            pipe.read_to_string(&mut stdout).map(|_| stdout)
        })
    });

    let start = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if start.elapsed() >= timeout => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(CalibrationError::ProbeTimeout { command, timeout });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(source) => return Err(CalibrationError::ProbeUnavailable { command, source }),
        }
    };

    if !status.success() {
        return Err(CalibrationError::ProbeFailed {
            command,
            status: status.to_string(),
        });
    }

    match reader {
        Some(handle) => handle
            .join()
            .map_err(|_| CalibrationError::ProbeOutput(format!("{command}: stdout reader panicked")))?
            .map_err(|e| CalibrationError::ProbeOutput(e.to_string())),
        None => Ok(String::new()),
    }
}

/// Parse `--query-gpu=name,driver_version,memory.total,count` CSV output.
pub fn parse_gpu_query(output: &str) -> Option<GpuQuery> {
    let lines: Vec<&str> = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let first = lines.first()?;

    let parts: Vec<&str> = first.split(',').map(str::trim).collect();
    if parts.len() < 3 {
        return None;
    }
    let vram: f64 = parts[2].parse().ok()?;
    if !vram.is_finite() || vram < 0.0 {
        return None;
    }

    Some(GpuQuery {
        name: parts[0].to_string(),
        driver_version: parts[1].to_string(),
        vram_total_mb: vram as u64,
        count: lines.len() as u32,
    })
}

/// Extract `CUDA Version: X.Y` from the `nvidia-smi` banner.
pub fn parse_cuda_banner(output: &str) -> Option<String> {
    CUDA_BANNER
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Extract `release X.Y` from `nvcc --version`.
pub fn parse_nvcc_release(output: &str) -> Option<String> {
    NVCC_RELEASE
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Parse the first line of `--query-gpu=power.draw` output.
pub fn parse_power_draw(output: &str) -> Option<f64> {
    let watts: f64 = output.lines().next()?.trim().parse().ok()?;
    (watts.is_finite() && watts >= 0.0).then_some(watts)
}

/// [`GpuProbe`] backed by the `nvidia-smi` and `nvcc` command-line tools.
#[derive(Debug, Clone)]
pub struct NvidiaSmiProbe {
    detect_timeout: Duration,
    power_timeout: Duration,
}

impl Default for NvidiaSmiProbe {
    fn default() -> Self {
        Self::new(Duration::from_secs(10), Duration::from_secs(2))
    }
}

impl NvidiaSmiProbe {
    /// Create a probe with the given detection and power-sample timeouts.
    pub fn new(detect_timeout: Duration, power_timeout: Duration) -> Self {
        Self {
            detect_timeout,
            power_timeout,
        }
    }

    fn run(&self, program: &str, args: &[&str], timeout: Duration) -> Option<String> {
        match run_with_timeout(program, args, timeout) {
            Ok(output) => Some(output),
            Err(e) => {
                debug!(error = %e, "Probe returned no data");
                None
            }
        }
    }
}

impl GpuProbe for NvidiaSmiProbe {
    fn query_gpu(&self) -> Option<GpuQuery> {
        let output = self.run(
            "nvidia-smi",
            &[
                "--query-gpu=name,driver_version,memory.total,count",
                "--format=csv,noheader,nounits",
            ],
            self.detect_timeout,
        )?;
        parse_gpu_query(&output)
    }

    fn toolkit_version(&self) -> Option<String> {
        let output = self.run("nvidia-smi", &[], self.detect_timeout)?;
        parse_cuda_banner(&output)
    }

    fn toolkit_version_fallback(&self) -> Option<String> {
        let output = self.run("nvcc", &["--version"], self.detect_timeout)?;
        parse_nvcc_release(&output)
    }

    fn power_draw_w(&self) -> Option<f64> {
        let output = self.run(
            "nvidia-smi",
            &["--query-gpu=power.draw", "--format=csv,noheader,nounits"],
            self.power_timeout,
        )?;
        parse_power_draw(&output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_gpu_query() {
        let output = "NVIDIA GeForce RTX 4090, 550.54.14, 24564, 2\n\
                      NVIDIA GeForce RTX 4090, 550.54.14, 24564, 2\n";
        let query = parse_gpu_query(output).unwrap();
        assert_eq!(query.name, "NVIDIA GeForce RTX 4090");
        assert_eq!(query.driver_version, "550.54.14");
        assert_eq!(query.vram_total_mb, 24564);
        assert_eq!(query.count, 2);
    }

    #[test]
    fn test_parse_gpu_query_rejects_garbage() {
        assert!(parse_gpu_query("").is_none());
        assert!(parse_gpu_query("No devices were found").is_none());
        assert!(parse_gpu_query("A100, 535.1, [N/A]").is_none());
    }

    #[test]
    fn test_parse_toolkit_versions() {
        let banner = "| NVIDIA-SMI 550.54.14   Driver Version: 550.54.14   CUDA Version: 12.4 |";
        assert_eq!(parse_cuda_banner(banner).as_deref(), Some("12.4"));
        let nvcc = "Cuda compilation tools, release 12.1, V12.1.105";
        assert_eq!(parse_nvcc_release(nvcc).as_deref(), Some("12.1"));
        assert!(parse_cuda_banner("nothing here").is_none());
    }

    #[test]
    fn test_parse_power_draw() {
        assert_eq!(parse_power_draw("287.45\n"), Some(287.45));
        assert_eq!(parse_power_draw("[N/A]"), None);
        assert_eq!(parse_power_draw(""), None);
    }

    #[test]
    fn test_missing_binary_is_unavailable() {
        let result = run_with_timeout(
            "ecocompute-definitely-not-a-binary",
            &[],
            Duration::from_millis(100),
        );
        assert!(matches!(result, Err(CalibrationError::ProbeUnavailable { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_output_larger_than_pipe_buffer() {
        let output = run_with_timeout(
            "sh",
            &["-c", "yes a | head -c 200000"],
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(output.len(), 200_000);
    }

    #[cfg(unix)]
    #[test]
    fn test_slow_command_times_out() {
        let result = run_with_timeout("sleep", &["5"], Duration::from_millis(50));
        assert!(matches!(result, Err(CalibrationError::ProbeTimeout { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_is_failure() {
        let result = run_with_timeout("sh", &["-c", "echo partial; exit 3"], Duration::from_secs(5));
        assert!(matches!(result, Err(CalibrationError::ProbeFailed { .. })));
    }
}
