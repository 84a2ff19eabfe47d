// Copyright 2025 EcoCompute Contributors
// SPDX-License-Identifier: Apache-2.0

//! Inference energy estimation from measured reference data.
//!
//! The estimate is a reference measurement (a 7B model at batch size 1)
//! scaled by model size, batch size and architecture:
//!
//! ```text
//! energy = reference × (params / 7) × batch_scale × arch_scale
//! ```

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::hardware::{Architecture, HardwareProfile};

/// Parameter count (billions) of the reference measurements.
pub const REFERENCE_PARAMS_B: f64 = 7.0;

/// Exponent of the batch-size power law used outside the measured table.
pub const BATCH_SCALE_EXPONENT: f64 = 0.78;

/// Architecture assumed when the hardware is unknown.
pub const DEFAULT_ARCHITECTURE: Architecture = Architecture::Ada;

/// Ada FP16 reference, the last-resort fallback.
const DEFAULT_REFERENCE_J: f64 = 5661.0;

/// Weight quantization scheme of the served model.
///
/// Labels outside the reference dataset are kept as [`Quantization::Other`];
/// they never match a table row, so estimates for them use the FP16
/// measurement of the same architecture.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Quantization {
    /// Half precision.
    #[default]
    Fp16,
    /// 4-bit NormalFloat.
    Nf4,
    /// bitsandbytes INT8 with the default outlier threshold.
    Int8Default,
    /// INT8 with mixed-precision decomposition disabled.
    Int8Pure,
    /// Any other label, e.g. `bf16` or `int4`, normalized to lowercase.
    Other(String),
}

impl Quantization {
    /// Identifier used on the command line and in reports.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Fp16 => "fp16",
            Self::Nf4 => "nf4",
            Self::Int8Default => "int8_default",
            Self::Int8Pure => "int8_pure",
            Self::Other(label) => label,
        }
    }

    /// Whether the reference dataset has measurements for this label.
    pub fn is_measured(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    /// Parse a label; unknown labels become [`Quantization::Other`].
    pub fn from_label(label: &str) -> Self {
        let normalized = label.trim().to_lowercase().replace('-', "_");
        match normalized.as_str() {
            "fp16" => Self::Fp16,
            "nf4" => Self::Nf4,
            "int8_default" | "int8" => Self::Int8Default,
            "int8_pure" => Self::Int8Pure,
            _ => Self::Other(normalized),
        }
    }
}

impl fmt::Display for Quantization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quantization {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_label(s))
    }
}

impl From<String> for Quantization {
    fn from(label: String) -> Self {
        Self::from_label(&label)
    }
}

impl From<Quantization> for String {
    fn from(quantization: Quantization) -> Self {
        quantization.as_str().to_string()
    }
}

/// Measured energy (J per 1k tokens, 7B model, batch size 1) by architecture
/// and quantization.
pub static REFERENCE_ENERGY: &[(Architecture, Quantization, f64)] = &[
    (Architecture::Ada, Quantization::Fp16, 5661.0),
    (Architecture::Ada, Quantization::Nf4, 3707.0),
    (Architecture::Ada, Quantization::Int8Default, 7401.0),
    (Architecture::Ada, Quantization::Int8Pure, 5212.0),
    (Architecture::Ampere, Quantization::Fp16, 4334.0),
    (Architecture::Ampere, Quantization::Int8Default, 9608.0),
    (Architecture::Ampere, Quantization::Int8Pure, 5781.0),
    (Architecture::Blackwell, Quantization::Fp16, 4908.0),
    (Architecture::Blackwell, Quantization::Nf4, 5483.0),
];

/// Measured per-request energy ratio versus batch size 1.
pub static BATCH_ENERGY_SCALE: &[(u32, f64)] = &[
    (1, 1.0),
    (2, 0.535),
    (4, 0.268),
    (8, 0.125),
    (16, 0.069),
    (32, 0.051),
    (64, 0.043),
];

/// Confidence of an [`EnergyEstimate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    /// Known hardware with reference data for its own architecture.
    High,
    /// Known hardware, reference data borrowed from another architecture.
    Medium,
    /// Unknown hardware.
    Low,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        })
    }
}

/// Result of [`estimate_energy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyEstimate {
    /// Estimated energy in joules per 1000 generated tokens.
    pub energy_j_per_1k_tokens: f64,
    /// How much to trust the number.
    pub confidence: Confidence,
    /// Architecture of the reference measurement used.
    pub reference_architecture: Architecture,
    /// Quantization of the reference measurement used.
    pub reference_quantization: Quantization,
    /// `params / 7`.
    pub model_scale: f64,
    /// Batch-size factor.
    pub batch_scale: f64,
    /// Architecture factor.
    pub arch_scale: f64,
}

impl EnergyEstimate {
    /// `arch/quant` key of the reference measurement.
    pub fn reference_key(&self) -> String {
        format!(
            "{}/{}",
            self.reference_architecture, self.reference_quantization
        )
    }
}

fn reference_energy(architecture: Architecture, quantization: &Quantization) -> Option<f64> {
    REFERENCE_ENERGY
        .iter()
        .find(|(arch, quant, _)| *arch == architecture && quant == quantization)
        .map(|(_, _, joules)| *joules)
}

/// Energy ratio of `batch_size` versus batch size 1. Zero is treated as 1.
pub fn batch_scale(batch_size: u32) -> f64 {
    let batch_size = batch_size.max(1);
    BATCH_ENERGY_SCALE
        .iter()
        .find(|(size, _)| *size == batch_size)
        .map(|(_, scale)| *scale)
        .unwrap_or_else(|| 1.0 / (batch_size as f64).powf(BATCH_SCALE_EXPONENT))
}

/// Estimate inference energy for a model on `hardware`.
pub fn estimate_energy(
    model_params_b: f64,
    quantization: &Quantization,
    batch_size: u32,
    hardware: &HardwareProfile,
) -> EnergyEstimate {
    let architecture = if hardware.known {
        hardware.architecture
    } else {
        DEFAULT_ARCHITECTURE
    };

    if !quantization.is_measured() {
        warn!(quantization = %quantization, "No reference data for quantization, using fp16");
    }

    let (reference_architecture, reference_quantization, reference) = [
        (architecture, quantization.clone()),
        (architecture, Quantization::Fp16),
    ]
    .into_iter()
    .find_map(|(arch, quant)| reference_energy(arch, &quant).map(|j| (arch, quant, j)))
    .unwrap_or((DEFAULT_ARCHITECTURE, Quantization::Fp16, DEFAULT_REFERENCE_J));

    let model_scale = model_params_b / REFERENCE_PARAMS_B;
    let batch_scale = batch_scale(batch_size);
    let arch_scale = if hardware.known {
        hardware.energy_scale_factor
    } else {
        1.0
    };

    let confidence = if !hardware.known {
        Confidence::Low
    } else if reference_architecture == architecture {
        Confidence::High
    } else {
        Confidence::Medium
    };

    EnergyEstimate {
        energy_j_per_1k_tokens: reference * model_scale * batch_scale * arch_scale,
        confidence,
        reference_architecture,
        reference_quantization,
        model_scale,
        batch_scale,
        arch_scale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::GpuQuery;

    fn known(name: &str) -> HardwareProfile {
        HardwareProfile::resolve(
            Some(GpuQuery {
                name: name.to_string(),
                driver_version: "550".to_string(),
                vram_total_mb: 81920,
                count: 1,
            }),
            None,
        )
    }

    #[test]
    fn test_reference_point_on_ada() {
        let estimate = estimate_energy(7.0, &Quantization::Nf4, 1, &known("RTX 4090"));
        assert_eq!(estimate.energy_j_per_1k_tokens, 3707.0);
        assert_eq!(estimate.confidence, Confidence::High);
        assert_eq!(estimate.reference_key(), "ada/nf4");
    }

    #[test]
    fn test_quantization_falls_back_to_fp16() {
        // no ampere nf4 measurement
        let estimate = estimate_energy(7.0, &Quantization::Nf4, 1, &known("A800"));
        assert_eq!(estimate.reference_key(), "ampere/fp16");
        assert_eq!(estimate.confidence, Confidence::High);
        assert!((estimate.energy_j_per_1k_tokens - 4334.0 * 0.77).abs() < 1e-9);
    }

    #[test]
    fn test_architecture_fallback_is_medium_confidence() {
        let estimate = estimate_energy(14.0, &Quantization::Fp16, 1, &known("H100"));
        assert_eq!(estimate.reference_key(), "ada/fp16");
        assert_eq!(estimate.confidence, Confidence::Medium);
        assert!((estimate.energy_j_per_1k_tokens - 5661.0 * 2.0 * 0.65).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_hardware_is_low_confidence() {
        let estimate = estimate_energy(7.0, &Quantization::Fp16, 1, &HardwareProfile::no_gpu());
        assert_eq!(estimate.confidence, Confidence::Low);
        assert_eq!(estimate.arch_scale, 1.0);
        assert_eq!(estimate.energy_j_per_1k_tokens, 5661.0);
    }

    #[test]
    fn test_batch_scale() {
        assert_eq!(batch_scale(64), 0.043);
        assert_eq!(batch_scale(1), 1.0);
        assert_eq!(batch_scale(0), 1.0);
        let expected = 1.0 / 5f64.powf(0.78);
        assert!((batch_scale(5) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_parse_quantization() {
        assert_eq!("NF4".parse::<Quantization>().unwrap(), Quantization::Nf4);
        assert_eq!("int8".parse::<Quantization>().unwrap(), Quantization::Int8Default);
        assert_eq!("int8-pure".parse::<Quantization>().unwrap(), Quantization::Int8Pure);
        assert_eq!(
            "BF16".parse::<Quantization>().unwrap(),
            Quantization::Other("bf16".to_string())
        );
    }

    #[test]
    fn test_unmeasured_label_uses_fp16_reference() {
        let bf16 = Quantization::from_label("bf16");
        assert!(!bf16.is_measured());

        let estimate = estimate_energy(7.0, &bf16, 1, &known("RTX 4090"));
        assert_eq!(estimate.reference_key(), "ada/fp16");
        assert_eq!(estimate.confidence, Confidence::High);
        assert_eq!(estimate.energy_j_per_1k_tokens, 5661.0);

        let estimate = estimate_energy(7.0, &Quantization::from_label("int4"), 1, &known("A800"));
        assert_eq!(estimate.reference_key(), "ampere/fp16");

        let estimate =
            estimate_energy(7.0, &Quantization::from_label("fp32"), 1, &HardwareProfile::no_gpu());
        assert_eq!(estimate.reference_key(), "ada/fp16");
        assert_eq!(estimate.confidence, Confidence::Low);
    }

    #[test]
    fn test_quantization_serializes_as_label() {
        let json = serde_json::to_string(&Quantization::Int8Pure).unwrap();
        assert_eq!(json, "\"int8_pure\"");
        let parsed: Quantization = serde_json::from_str("\"int4\"").unwrap();
        assert_eq!(parsed, Quantization::Other("int4".to_string()));
    }
}
