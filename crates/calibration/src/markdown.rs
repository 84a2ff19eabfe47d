// Copyright 2025 EcoCompute Contributors
// SPDX-License-Identifier: Apache-2.0

//! Markdown sections for hardware, regression and estimation results.

use std::fmt::{self, Write};

use crate::baseline::Baseline;
use crate::estimate::{Confidence, EnergyEstimate};
use crate::hardware::HardwareProfile;
use crate::regression::RelativeChange;

fn signed(value: i64) -> String {
    if value > 0 {
        format!("+{value}")
    } else {
        value.to_string()
    }
}

fn or_unknown(value: &str) -> &str {
    if value.is_empty() {
        "unknown"
    } else {
        value
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn write_hardware(output: &mut String, hardware: &HardwareProfile) -> fmt::Result {
    writeln!(output, "### 🖥️ Hardware Environment")?;
    writeln!(output)?;

    if !hardware.has_gpu() {
        writeln!(
            output,
            "> ⚠️ **No GPU detected.** Energy measurement needs an NVIDIA GPU; \
             this run relies on static analysis and estimation."
        )?;
        writeln!(output)?;
        return Ok(());
    }

    let family = if hardware.known {
        format!(" ({})", title_case(hardware.architecture.as_str()))
    } else {
        String::new()
    };

    writeln!(output, "| Property | Value |")?;
    writeln!(output, "|----------|-------|")?;
    writeln!(output, "| GPU | **{}**{} |", hardware.display_name, family)?;
    writeln!(output, "| GPU Count | {} |", hardware.instance_count)?;
    writeln!(
        output,
        "| VRAM | {:.1} GB |",
        hardware.vram_total_mb as f64 / 1024.0
    )?;
    writeln!(output, "| Driver | {} |", or_unknown(&hardware.driver_version))?;
    writeln!(output, "| CUDA | {} |", or_unknown(&hardware.cuda_version))?;
    if hardware.known {
        writeln!(output, "| TDP | {}W |", hardware.thermal_design_power_w)?;
        writeln!(output, "| Reference Data | ✅ Matched |")?;
        writeln!(
            output,
            "| Energy Scale Factor | {:.2}× (vs Ada) |",
            hardware.energy_scale_factor
        )?;
    } else {
        writeln!(
            output,
            "| Reference Data | ⚠️ Not in reference dataset, estimates may vary |"
        )?;
    }
    writeln!(output, "| Hardware Fingerprint | `{}` |", hardware.hardware_fingerprint)?;
    writeln!(output)?;
    Ok(())
}

fn write_relative_change(
    output: &mut String,
    change: &RelativeChange,
    baseline: Option<&Baseline>,
) -> fmt::Result {
    writeln!(output, "### 📈 Relative Change (vs Baseline)")?;
    writeln!(output)?;

    let baseline = match baseline {
        Some(baseline) if change.has_baseline => baseline,
        _ => {
            writeln!(output, "> {}", change.reason)?;
            writeln!(output)?;
            return Ok(());
        }
    };

    let status = if change.passed { "✅ PASSED" } else { "❌ FAILED" };
    writeln!(output, "**Status: {status}**")?;
    writeln!(output)?;
    writeln!(output, "> {}", change.reason)?;
    writeln!(output)?;

    writeln!(output, "| Metric | Baseline | Current | Change |")?;
    writeln!(output, "|--------|----------|---------|--------|")?;
    writeln!(
        output,
        "| Issues | {} | {} | {} |",
        baseline.total_issues,
        baseline.total_issues as i64 + change.issues_delta,
        signed(change.issues_delta)
    )?;
    writeln!(
        output,
        "| Critical | {} | {} | {} |",
        baseline.critical_count,
        baseline.critical_count as i64 + change.critical_delta,
        signed(change.critical_delta)
    )?;
    if change.energy_change_pct != 0.0 {
        let arrow = if change.energy_change_pct > 0.0 { "📈" } else { "📉" };
        let current = baseline.energy_per_tflop_joules * (1.0 + change.energy_change_pct / 100.0);
        writeln!(
            output,
            "| Energy/TFLOP | {:.1} J | {:.1} J | {} {:+.1}% |",
            baseline.energy_per_tflop_joules, current, arrow, change.energy_change_pct
        )?;
    }
    if change.benchmark_change_pct != 0.0 {
        writeln!(
            output,
            "| Throughput | {:.1} TFLOPS | | {:+.1}% |",
            baseline.benchmark_score_tflops, -change.benchmark_change_pct
        )?;
    }

    if !change.same_hardware {
        writeln!(output)?;
        writeln!(
            output,
            "⚠️ **Hardware changed** since baseline (was `{}`, fingerprint `{}`). \
             Comparison may be affected.",
            or_unknown(&baseline.gpu_name),
            or_unknown(&baseline.hardware_fingerprint)
        )?;
    } else if change.low_confidence {
        writeln!(output)?;
        writeln!(
            output,
            "⚠️ Baseline was calibrated with a different method. Energy figures are approximate."
        )?;
    }
    if change.throughput_gap {
        writeln!(output)?;
        writeln!(
            output,
            "⚠️ Throughput dropped by {:.1}% but no energy data is available to gate on.",
            change.benchmark_change_pct
        )?;
    }

    let commit: String = baseline.commit_sha.chars().take(7).collect();
    writeln!(output)?;
    writeln!(
        output,
        "*Baseline from commit `{}` on `{}` ({})*",
        or_unknown(&commit),
        or_unknown(&baseline.branch),
        or_unknown(&baseline.timestamp)
    )?;
    writeln!(output)?;
    Ok(())
}

fn write_estimation(
    output: &mut String,
    estimate: &EnergyEstimate,
    model: &str,
    batch_size: u32,
) -> fmt::Result {
    writeln!(output, "### ⚡ Energy Estimation")?;
    writeln!(output)?;
    writeln!(output, "| Parameter | Value |")?;
    writeln!(output, "|-----------|-------|")?;
    writeln!(output, "| Model | {model} |")?;
    writeln!(output, "| Batch Size | {batch_size} |")?;
    writeln!(
        output,
        "| Estimated Energy | **{:.0} J/1k tokens** |",
        estimate.energy_j_per_1k_tokens
    )?;
    writeln!(output, "| Confidence | {} |", estimate.confidence)?;
    writeln!(
        output,
        "| Reference | {} × {:.2}× (model) × {:.3}× (batch) × {:.2}× (arch) |",
        estimate.reference_key(),
        estimate.model_scale,
        estimate.batch_scale,
        estimate.arch_scale
    )?;
    writeln!(output)?;

    match estimate.confidence {
        Confidence::Low => writeln!(
            output,
            "> ⚠️ Low confidence: hardware is not in the reference dataset. \
             Run `ecocompute calibrate` to establish a local baseline."
        )?,
        Confidence::Medium => writeln!(
            output,
            "> Estimate borrows reference data from another architecture and scales it."
        )?,
        Confidence::High => return Ok(()),
    }
    writeln!(output)?;
    Ok(())
}

/// Hardware environment table.
pub fn hardware_section(hardware: &HardwareProfile) -> String {
    let mut output = String::new();
    let _ = write_hardware(&mut output, hardware);
    output
}

/// Regression verdict with a baseline/current table.
pub fn relative_change_section(change: &RelativeChange, baseline: Option<&Baseline>) -> String {
    let mut output = String::new();
    let _ = write_relative_change(&mut output, change, baseline);
    output
}

/// Energy estimate table.
pub fn estimation_section(estimate: &EnergyEstimate, model: &str, batch_size: u32) -> String {
    let mut output = String::new();
    let _ = write_estimation(&mut output, estimate, model, batch_size);
    output
}
