// Copyright 2025 EcoCompute Contributors
// SPDX-License-Identifier: Apache-2.0

//! Runtime configuration.
//!
//! Settings are layered, later layers winning:
//!
//! 1. Built-in defaults
//! 2. `ecocompute.toml` in the working directory (optional)
//! 3. An explicit file passed to [`Settings::load`] (required if given)
//! 4. Environment variables prefixed with `ECOCOMPUTE_`, using `__` to
//!    separate sections, e.g. `ECOCOMPUTE_AUDIT__SEVERITY_THRESHOLD=critical`
//!
//! # Example
//!
//! ```no_run
//! use ecocompute_core::Settings;
//!
//! let settings = Settings::load(None)?;
//! println!("threshold: {}", settings.audit.severity_threshold);
//! # Ok::<(), ecocompute_core::ConfigError>(())
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::severity::Severity;

/// Default configuration file stem looked up in the working directory.
pub const DEFAULT_CONFIG_STEM: &str = "ecocompute";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "ECOCOMPUTE";

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A source could not be read or a value could not be converted.
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// A value was read but is out of range.
    #[error("Invalid configuration value for {key}: {reason}")]
    Invalid {
        /// Dotted key of the offending value.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Audit (rule engine) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditSettings {
    /// Minimum severity reported.
    pub severity_threshold: Severity,
    /// Maximum number of files discovered from directory arguments.
    pub max_files: usize,
    /// Exit non-zero when critical findings remain after filtering.
    pub fail_on_critical: bool,
    /// File extensions (without the dot) considered source files.
    pub extensions: Vec<String>,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            severity_threshold: Severity::Warning,
            max_files: 50,
            fail_on_critical: true,
            extensions: vec!["py".to_string()],
        }
    }
}

/// Baseline store and regression gate settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineSettings {
    /// Directory holding the baseline document, relative to the workspace.
    pub dir: PathBuf,
    /// Baseline document file name.
    pub file_name: String,
    /// Energy regression tolerance in percent.
    pub regression_threshold_pct: f64,
    /// Also fail the gate on throughput-only regressions.
    pub gate_on_throughput: bool,
}

impl Default for BaselineSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".ecocompute"),
            file_name: "baseline.json".to_string(),
            regression_threshold_pct: 5.0,
            gate_on_throughput: false,
        }
    }
}

impl BaselineSettings {
    /// Full path of the baseline document under `workspace`.
    pub fn path_in(&self, workspace: impl AsRef<Path>) -> PathBuf {
        workspace.as_ref().join(&self.dir).join(&self.file_name)
    }
}

/// GPU detection and calibration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationSettings {
    /// Wall-clock budget of the compute benchmark, in seconds.
    pub benchmark_duration_s: f64,
    /// Wall-clock budget of the power-only sampling loop, in seconds.
    pub power_sampling_duration_s: f64,
    /// Pause between power samples in the power-only loop (~5 Hz).
    pub sampling_interval_ms: u64,
    /// Timeout for a single power probe invocation.
    pub probe_timeout_ms: u64,
    /// Timeout for hardware detection probes.
    pub detect_timeout_ms: u64,
    /// Square matrix dimension of the matmul benchmark.
    pub matrix_size: usize,
    /// Discarded warm-up iterations before timing starts.
    pub warmup_iterations: u32,
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            benchmark_duration_s: 5.0,
            power_sampling_duration_s: 3.0,
            sampling_interval_ms: 200,
            probe_timeout_ms: 2_000,
            detect_timeout_ms: 10_000,
            matrix_size: 2048,
            warmup_iterations: 5,
        }
    }
}

impl CalibrationSettings {
    /// Compute benchmark budget.
    pub fn benchmark_duration(&self) -> Duration {
        Duration::from_secs_f64(self.benchmark_duration_s.max(0.0))
    }

    /// Power sampling budget.
    pub fn power_sampling_duration(&self) -> Duration {
        Duration::from_secs_f64(self.power_sampling_duration_s.max(0.0))
    }

    /// Pause between power samples.
    pub fn sampling_interval(&self) -> Duration {
        Duration::from_millis(self.sampling_interval_ms)
    }

    /// Power probe timeout.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Detection probe timeout.
    pub fn detect_timeout(&self) -> Duration {
        Duration::from_millis(self.detect_timeout_ms)
    }
}

/// Top-level EcoCompute settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Rule engine settings.
    pub audit: AuditSettings,
    /// Baseline and regression settings.
    pub baseline: BaselineSettings,
    /// Detection and calibration settings.
    pub calibration: CalibrationSettings,
}

impl Settings {
    /// Load settings from defaults, `ecocompute.toml`, an optional explicit
    /// file and `ECOCOMPUTE_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    fn load_with_prefix(path: Option<&Path>, env_prefix: &str) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name(DEFAULT_CONFIG_STEM).required(false));

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values that would make the run meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.baseline.regression_threshold_pct.is_finite()
            || self.baseline.regression_threshold_pct < 0.0
        {
            return Err(ConfigError::Invalid {
                key: "baseline.regression_threshold_pct".to_string(),
                reason: "must be a non-negative number".to_string(),
            });
        }
        if self.baseline.file_name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "baseline.file_name".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.calibration.matrix_size == 0 {
            return Err(ConfigError::Invalid {
                key: "calibration.matrix_size".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if !self.calibration.benchmark_duration_s.is_finite()
            || !self.calibration.power_sampling_duration_s.is_finite()
        {
            return Err(ConfigError::Invalid {
                key: "calibration".to_string(),
                reason: "durations must be finite".to_string(),
            });
        }
        Ok(())
    }
}
