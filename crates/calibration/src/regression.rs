// Copyright 2025 EcoCompute Contributors
// SPDX-License-Identifier: Apache-2.0

//! Regression gate.
//!
//! [`classify`] compares the current run against a stored [`Baseline`] and
//! decides pass/fail. Checks run in a fixed order and the first failing
//! check wins:
//!
//! 1. no baseline: pass
//! 2. new critical findings: fail
//! 3. energy per TFLOP grew past the threshold: fail
//! 4. (opt-in) throughput dropped past the threshold: fail
//! 5. new non-critical findings: pass with a warning
//! 6. otherwise: pass

use ecocompute_core::SeverityCounts;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::baseline::{Baseline, BaselineStore};
use crate::calibrate::CalibrationResult;
use crate::hardware::HardwareProfile;

/// Finding counts of the current run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// All findings after threshold filtering.
    pub total_issues: usize,
    /// Critical findings.
    pub critical_count: usize,
    /// Warning findings.
    pub warning_count: usize,
}

impl From<&SeverityCounts> for RunSummary {
    fn from(counts: &SeverityCounts) -> Self {
        Self {
            total_issues: counts.total(),
            critical_count: counts.critical,
            warning_count: counts.warning,
        }
    }
}

/// Gate policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionPolicy {
    /// Tolerated energy (and, if gated, throughput) regression in percent.
    pub threshold_pct: f64,
    /// Fail on throughput regressions when no energy data is available.
    pub gate_on_throughput: bool,
}

impl Default for RegressionPolicy {
    fn default() -> Self {
        Self {
            threshold_pct: 5.0,
            gate_on_throughput: false,
        }
    }
}

/// Verdict of the regression gate. Never persisted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RelativeChange {
    /// Whether a baseline was found.
    pub has_baseline: bool,
    /// Whether the baseline was recorded on this hardware.
    pub same_hardware: bool,
    /// Energy-per-TFLOP change in percent, positive is worse.
    pub energy_change_pct: f64,
    /// Change in total findings.
    pub issues_delta: i64,
    /// Change in critical findings.
    pub critical_delta: i64,
    /// Change in warning findings.
    pub warning_delta: i64,
    /// Throughput drop in percent, positive is worse. Only computed when
    /// energy-per-TFLOP data is missing.
    pub benchmark_change_pct: f64,
    /// Gate verdict.
    pub passed: bool,
    /// Human-readable explanation.
    pub reason: String,
    /// Hardware or calibration method differs from the baseline.
    pub low_confidence: bool,
    /// Throughput regressed past the threshold without failing the gate.
    pub throughput_gap: bool,
}

fn delta(current: usize, baseline: usize) -> i64 {
    current as i64 - baseline as i64
}

fn percent_change(from: f64, to: f64) -> f64 {
    (to - from) / from * 100.0
}

/// Classify the current run against `baseline`.
pub fn classify(
    baseline: Option<&Baseline>,
    fingerprint: &str,
    current: &RunSummary,
    calibration: &CalibrationResult,
    policy: &RegressionPolicy,
) -> RelativeChange {
    let Some(baseline) = baseline else {
        return RelativeChange {
            passed: true,
            reason: "No baseline found. This run will be saved as the new baseline.".to_string(),
            ..RelativeChange::default()
        };
    };

    let mut change = RelativeChange {
        has_baseline: true,
        same_hardware: baseline.hardware_fingerprint == fingerprint,
        issues_delta: delta(current.total_issues, baseline.total_issues),
        critical_delta: delta(current.critical_count, baseline.critical_count),
        warning_delta: delta(current.warning_count, baseline.warning_count),
        ..RelativeChange::default()
    };
    change.low_confidence =
        !change.same_hardware || baseline.method != Some(calibration.method);

    if calibration.energy_per_tflop_joules > 0.0 && baseline.energy_per_tflop_joules > 0.0 {
        change.energy_change_pct = percent_change(
            baseline.energy_per_tflop_joules,
            calibration.energy_per_tflop_joules,
        );
    } else if calibration.benchmark_score_tflops > 0.0 && baseline.benchmark_score_tflops > 0.0 {
        change.benchmark_change_pct = -percent_change(
            baseline.benchmark_score_tflops,
            calibration.benchmark_score_tflops,
        );
    }

    let threshold = policy.threshold_pct;
    let throughput_regressed = change.benchmark_change_pct > threshold;

    if change.critical_delta > 0 {
        change.passed = false;
        change.reason = format!(
            "❌ {} new critical issue(s) introduced.",
            change.critical_delta
        );
    } else if change.energy_change_pct > threshold {
        change.passed = false;
        change.reason = format!(
            "❌ Energy efficiency regressed by {:.1}% (threshold: {:.1}%).",
            change.energy_change_pct, threshold
        );
    } else if policy.gate_on_throughput && throughput_regressed {
        change.passed = false;
        change.reason = format!(
            "❌ Throughput dropped by {:.1}% (threshold: {:.1}%).",
            change.benchmark_change_pct, threshold
        );
    } else if change.issues_delta > 0 {
        change.passed = true;
        change.reason = format!(
            "⚠️ {} new issue(s) found (no critical regressions).",
            change.issues_delta
        );
    } else if change.issues_delta < 0 {
        change.passed = true;
        change.reason = format!("✅ {} issue(s) fixed!", -change.issues_delta);
    } else {
        change.passed = true;
        change.reason = "✅ No regressions detected.".to_string();
    }

    change.throughput_gap = throughput_regressed && change.passed;

    debug!(
        passed = change.passed,
        critical_delta = change.critical_delta,
        energy_change_pct = change.energy_change_pct,
        benchmark_change_pct = change.benchmark_change_pct,
        "Classified run"
    );
    change
}

/// Outcome of [`compare_with_store`]: the verdict and the baseline it used.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    /// Gate verdict.
    pub change: RelativeChange,
    /// Baseline compared against, if any.
    pub baseline: Option<Baseline>,
}

/// Load the baseline for `hardware` from `store` and classify the run.
pub fn compare_with_store(
    store: &BaselineStore,
    hardware: &HardwareProfile,
    current: &RunSummary,
    calibration: &CalibrationResult,
    policy: &RegressionPolicy,
) -> Comparison {
    let baseline = store.load(&hardware.hardware_fingerprint);
    let change = classify(
        baseline.as_ref(),
        &hardware.hardware_fingerprint,
        current,
        calibration,
        policy,
    );
    info!(passed = change.passed, reason = %change.reason, "Regression gate");
    Comparison { change, baseline }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibrate::CalibrationMethod;
    use tempfile::TempDir;

    fn baseline() -> Baseline {
        Baseline {
            hardware_fingerprint: "fp".to_string(),
            gpu_name: "RTX 4090".to_string(),
            timestamp: "2025-01-01T00:00:00Z".to_string(),
            benchmark_score_tflops: 100.0,
            avg_power_draw_w: 400.0,
            energy_per_tflop_joules: 4.0,
            total_issues: 3,
            critical_count: 1,
            warning_count: 2,
            method: Some(CalibrationMethod::ComputeBenchmark),
            ..Baseline::default()
        }
    }

    fn run(total: usize, critical: usize, warning: usize) -> RunSummary {
        RunSummary {
            total_issues: total,
            critical_count: critical,
            warning_count: warning,
        }
    }

    fn calibration(tflops: f64, energy: f64) -> CalibrationResult {
        CalibrationResult {
            benchmark_score_tflops: tflops,
            energy_per_tflop_joules: energy,
            method: CalibrationMethod::ComputeBenchmark,
            ..CalibrationResult::default()
        }
    }

    #[test]
    fn test_no_baseline_passes() {
        let change = classify(
            None,
            "fp",
            &run(5, 5, 0),
            &calibration(0.0, 0.0),
            &RegressionPolicy::default(),
        );
        assert!(!change.has_baseline);
        assert!(change.passed);
    }

    #[test]
    fn test_critical_regression_dominates_energy_improvement() {
        for energy in [0.1, 4.0, 100.0] {
            let change = classify(
                Some(&baseline()),
                "fp",
                &run(3, 2, 1),
                &calibration(100.0, energy),
                &RegressionPolicy::default(),
            );
            assert!(!change.passed);
            assert_eq!(change.critical_delta, 1);
            assert!(change.reason.contains("1 new critical"));
        }
    }

    #[test]
    fn test_energy_regression_fails() {
        let change = classify(
            Some(&baseline()),
            "fp",
            &run(3, 1, 2),
            &calibration(100.0, 4.4),
            &RegressionPolicy::default(),
        );
        assert!(!change.passed);
        assert!((change.energy_change_pct - 10.0).abs() < 1e-9);
        assert_eq!(change.benchmark_change_pct, 0.0);
    }

    #[test]
    fn test_energy_within_threshold_passes() {
        let change = classify(
            Some(&baseline()),
            "fp",
            &run(3, 1, 2),
            &calibration(100.0, 4.1),
            &RegressionPolicy::default(),
        );
        assert!(change.passed);
        assert_eq!(change.reason, "✅ No regressions detected.");
        assert!(!change.low_confidence);
    }

    #[test]
    fn test_new_warnings_pass_with_warning_reason() {
        let change = classify(
            Some(&baseline()),
            "fp",
            &run(5, 1, 4),
            &calibration(0.0, 0.0),
            &RegressionPolicy::default(),
        );
        assert!(change.passed);
        assert_eq!(change.issues_delta, 2);
        assert_eq!(change.warning_delta, 2);
        assert!(change.reason.starts_with("⚠️ 2 new issue(s)"));
    }

    #[test]
    fn test_fixed_issues_are_reported() {
        let change = classify(
            Some(&baseline()),
            "fp",
            &run(1, 0, 1),
            &calibration(0.0, 0.0),
            &RegressionPolicy::default(),
        );
        assert!(change.passed);
        assert_eq!(change.reason, "✅ 2 issue(s) fixed!");
    }

    #[test]
    fn test_throughput_only_regression_is_a_gap_by_default() {
        let change = classify(
            Some(&baseline()),
            "fp",
            &run(3, 1, 2),
            &calibration(80.0, 0.0),
            &RegressionPolicy::default(),
        );
        assert!(change.passed);
        assert!((change.benchmark_change_pct - 20.0).abs() < 1e-9);
        assert_eq!(change.energy_change_pct, 0.0);
        assert!(change.throughput_gap);
    }

    #[test]
    fn test_throughput_gate_when_enabled() {
        let policy = RegressionPolicy {
            gate_on_throughput: true,
            ..RegressionPolicy::default()
        };
        let change = classify(
            Some(&baseline()),
            "fp",
            &run(3, 1, 2),
            &calibration(80.0, 0.0),
            &policy,
        );
        assert!(!change.passed);
        assert!(!change.throughput_gap);
        assert!(change.reason.contains("Throughput dropped by 20.0%"));
    }

    #[test]
    fn test_other_hardware_is_flagged() {
        let change = classify(
            Some(&baseline()),
            "different",
            &run(3, 1, 2),
            &calibration(100.0, 4.0),
            &RegressionPolicy::default(),
        );
        assert!(change.has_baseline);
        assert!(!change.same_hardware);
        assert!(change.low_confidence);
    }

    #[test]
    fn test_mixed_methods_lower_confidence_only() {
        let mut cal = calibration(0.0, 0.0);
        cal.method = CalibrationMethod::PowerSampling;
        let change = classify(
            Some(&baseline()),
            "fp",
            &run(3, 1, 2),
            &cal,
            &RegressionPolicy::default(),
        );
        assert!(change.same_hardware);
        assert!(change.low_confidence);
        assert!(change.passed);
    }

    #[test]
    fn test_compare_with_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = BaselineStore::new(dir.path().join("baseline.json"));
        let comparison = compare_with_store(
            &store,
            &HardwareProfile::no_gpu(),
            &run(0, 0, 0),
            &CalibrationResult::default(),
            &RegressionPolicy::default(),
        );
        assert!(comparison.baseline.is_none());
        assert!(!comparison.change.has_baseline);
        assert!(comparison.change.passed);
    }

    #[test]
    fn test_gpu_less_run_compares_against_its_own_baseline() {
        let dir = TempDir::new().unwrap();
        let store = BaselineStore::new(dir.path().join("baseline.json"));
        let hardware = HardwareProfile::no_gpu();
        let calibration = CalibrationResult::empty(CalibrationMethod::Estimated);
        let counts = SeverityCounts {
            critical: 2,
            warning: 0,
            info: 0,
        };

        let mut own = Baseline::from_run(&hardware, &calibration, &counts, "aaa", "main");
        own.timestamp = "2025-01-01T00:00:00Z".to_string();
        store.save(&own).unwrap();

        let newer_gpu = Baseline {
            hardware_fingerprint: "abcdef012345".to_string(),
            timestamp: "2025-06-01T00:00:00Z".to_string(),
            critical_count: 0,
            ..baseline()
        };
        store.save(&newer_gpu).unwrap();

        let comparison = compare_with_store(
            &store,
            &hardware,
            &RunSummary::from(&counts),
            &calibration,
            &RegressionPolicy::default(),
        );
        let used = comparison.baseline.unwrap();
        assert_eq!(used.hardware_fingerprint, hardware.hardware_fingerprint);
        assert!(comparison.change.same_hardware);
        assert!(comparison.change.passed);
        assert_eq!(comparison.change.critical_delta, 0);
    }
}
