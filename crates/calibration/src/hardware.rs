// Copyright 2025 EcoCompute Contributors
// SPDX-License-Identifier: Apache-2.0

//! Hardware profile resolution.
//!
//! A [`HardwareProfile`] combines what the probe reports with a static table
//! of known GPU models. Unknown models still get a profile, flagged
//! `known = false`, so downstream consumers can lower their confidence.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use tracing::{debug, info};

use crate::probe::{GpuProbe, GpuQuery};

/// Number of hex characters kept from the fingerprint digest.
pub const FINGERPRINT_LEN: usize = 12;

/// GPU micro-architecture family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    /// RTX 50 series.
    Blackwell,
    /// RTX 40 series, L4, L40S.
    Ada,
    /// RTX 30 series, A100, A800, A6000.
    Ampere,
    /// H100, H200.
    Hopper,
    /// T4.
    Turing,
    /// V100.
    Volta,
    /// Anything not in the table.
    #[default]
    Unknown,
}

impl Architecture {
    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blackwell => "blackwell",
            Self::Ada => "ada",
            Self::Ampere => "ampere",
            Self::Hopper => "hopper",
            Self::Turing => "turing",
            Self::Volta => "volta",
            Self::Unknown => "unknown",
        }
    }

    /// Relative energy scale versus Ada (lower is more efficient).
    pub fn energy_scale(&self) -> f64 {
        match self {
            Self::Blackwell => 0.85,
            Self::Ada => 1.0,
            Self::Ampere => 0.77,
            Self::Hopper => 0.65,
            Self::Turing => 1.40,
            Self::Volta => 1.50,
            Self::Unknown => 1.0,
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the known-GPU table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KnownGpu {
    /// Lowercase substring matched against the reported GPU name.
    pub key: &'static str,
    /// Architecture family.
    pub architecture: Architecture,
    /// Compute capability as `major * 10 + minor`.
    pub compute_capability: u32,
    /// Nominal memory in GB.
    pub vram_gb: u32,
    /// Thermal design power in watts.
    pub tdp_w: u32,
    /// Typical idle draw in watts.
    pub idle_w: u32,
}

const fn gpu(
    key: &'static str,
    architecture: Architecture,
    compute_capability: u32,
    vram_gb: u32,
    tdp_w: u32,
    idle_w: u32,
) -> KnownGpu {
    KnownGpu {
        key,
        architecture,
        compute_capability,
        vram_gb,
        tdp_w,
        idle_w,
    }
}

/// Known GPU models. Order matters: the first key contained in the reported
/// name wins, so more specific keys must not be shadowed by earlier ones
/// unless the shadowing is intended (`rtx 4090` also covers `rtx 4090d`).
pub static KNOWN_GPUS: &[KnownGpu] = &[
    gpu("rtx 5090", Architecture::Blackwell, 120, 32, 575, 22),
    gpu("rtx 5080", Architecture::Blackwell, 120, 16, 360, 18),
    gpu("rtx 4090", Architecture::Ada, 89, 24, 450, 17),
    gpu("rtx 4090d", Architecture::Ada, 89, 24, 425, 17),
    gpu("rtx 4080", Architecture::Ada, 89, 16, 320, 15),
    gpu("rtx 4070", Architecture::Ada, 89, 12, 200, 12),
    gpu("a800", Architecture::Ampere, 80, 80, 400, 65),
    gpu("a100", Architecture::Ampere, 80, 80, 400, 65),
    gpu("a6000", Architecture::Ampere, 86, 48, 300, 25),
    gpu("rtx 3090", Architecture::Ampere, 86, 24, 350, 20),
    gpu("rtx 3080", Architecture::Ampere, 86, 10, 320, 18),
    gpu("h100", Architecture::Hopper, 90, 80, 700, 70),
    gpu("h200", Architecture::Hopper, 90, 141, 700, 70),
    gpu("v100", Architecture::Volta, 70, 32, 300, 40),
    gpu("t4", Architecture::Turing, 75, 16, 70, 10),
    gpu("l4", Architecture::Ada, 89, 24, 72, 12),
    gpu("l40s", Architecture::Ada, 89, 48, 350, 30),
];

/// First table entry whose key is contained in `name` (case-insensitive).
pub fn lookup_known_gpu(name: &str) -> Option<&'static KnownGpu> {
    let name = name.to_lowercase();
    KNOWN_GPUS.iter().find(|gpu| name.contains(gpu.key))
}

/// Stable short identifier for a (name, driver, memory) triple.
pub fn fingerprint(name: &str, driver_version: &str, vram_total_mb: u64) -> String {
    let digest = Sha256::digest(format!("{name}|{driver_version}|{vram_total_mb}").as_bytes());
    let mut hash = hex::encode(digest);
    hash.truncate(FINGERPRINT_LEN);
    hash
}

/// Resolved description of the local accelerator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareProfile {
    /// GPU name as reported, or `"No GPU detected"`.
    pub display_name: String,
    /// Number of devices.
    pub instance_count: u32,
    /// Driver version.
    pub driver_version: String,
    /// CUDA toolkit version, empty if unknown.
    pub cuda_version: String,
    /// Total memory in MiB.
    pub vram_total_mb: u64,
    /// Architecture family.
    pub architecture: Architecture,
    /// Whether the model was found in [`KNOWN_GPUS`].
    pub known: bool,
    /// Thermal design power in watts (0 if unknown).
    pub thermal_design_power_w: u32,
    /// Idle draw in watts (0 if unknown).
    pub idle_power_w: u32,
    /// Architecture energy scale (1.0 if unknown).
    pub energy_scale_factor: f64,
    /// Short hash of name, driver and memory; always present.
    pub hardware_fingerprint: String,
}

impl Default for HardwareProfile {
    fn default() -> Self {
        Self::no_gpu()
    }
}

impl HardwareProfile {
    /// Profile for a machine without a responding GPU.
    ///
    /// The fingerprint is still derived from the (empty) probe answer, so
    /// GPU-less runners keep their own baseline key.
    pub fn no_gpu() -> Self {
        const NAME: &str = "No GPU detected";
        Self {
            display_name: NAME.to_string(),
            instance_count: 0,
            driver_version: String::new(),
            cuda_version: String::new(),
            vram_total_mb: 0,
            architecture: Architecture::Unknown,
            known: false,
            thermal_design_power_w: 0,
            idle_power_w: 0,
            energy_scale_factor: 1.0,
            hardware_fingerprint: fingerprint(NAME, "", 0),
        }
    }

    /// Whether at least one GPU answered the probe.
    pub fn has_gpu(&self) -> bool {
        self.instance_count > 0
    }

    /// Build a profile from probe answers without touching the machine.
    pub fn resolve(query: Option<GpuQuery>, cuda_version: Option<String>) -> Self {
        let Some(query) = query else {
            return Self::no_gpu();
        };

        let hardware_fingerprint =
            fingerprint(&query.name, &query.driver_version, query.vram_total_mb);
        let mut profile = Self {
            display_name: query.name,
            instance_count: query.count.max(1),
            driver_version: query.driver_version,
            cuda_version: cuda_version.unwrap_or_default(),
            vram_total_mb: query.vram_total_mb,
            hardware_fingerprint,
            ..Self::no_gpu()
        };

        if let Some(gpu) = lookup_known_gpu(&profile.display_name) {
            profile.architecture = gpu.architecture;
            profile.known = true;
            profile.thermal_design_power_w = gpu.tdp_w;
            profile.idle_power_w = gpu.idle_w;
            profile.energy_scale_factor = gpu.architecture.energy_scale();
        }
        profile
    }

    /// Probe the machine and resolve its profile.
    pub fn detect(probe: &dyn GpuProbe) -> Self {
        let query = probe.query_gpu();
        if query.is_none() {
            debug!("GPU probe returned nothing");
            return Self::no_gpu();
        }

        let cuda_version = probe
            .toolkit_version()
            .or_else(|| probe.toolkit_version_fallback());

        let profile = Self::resolve(query, cuda_version);
        info!(
            gpu = %profile.display_name,
            count = profile.instance_count,
            architecture = %profile.architecture,
            known = profile.known,
            fingerprint = %profile.hardware_fingerprint,
            "Detected hardware"
        );
        profile
    }
}
