// Copyright 2025 EcoCompute Contributors
// SPDX-License-Identifier: Apache-2.0

//! Audit rules.
//!
//! Each rule encodes one energy-waste heuristic measured on RTX 5090,
//! RTX 4090D and A800 hardware. Rules are independent and pure: the same
//! content always yields the same findings, and a rule that cannot make
//! sense of its input reports nothing rather than failing.

mod default_int8;
mod device_placement;
pub(crate) mod patterns;
mod precision_conflict;
mod redundant_params;
mod sequential_generate;
mod small_model_nf4;

pub use default_int8::DefaultInt8;
pub use device_placement::MissingDeviceMap;
pub use precision_conflict::PrecisionConflict;
pub use redundant_params::Redundant4BitParams;
pub use sequential_generate::SequentialGenerate;
pub use small_model_nf4::{SmallModelNf4, SMALL_MODELS};

use ecocompute_core::{Finding, Severity};

/// A single text-pattern detector.
///
/// Implement this trait for any heuristic that should run as part of the
/// audit. Rules see the whole file content and the identifier used to
/// report locations.
pub trait Rule: Send + Sync {
    /// Stable kebab-case identifier.
    fn id(&self) -> &'static str;

    /// Severity of the findings this rule emits.
    fn severity(&self) -> Severity;

    /// Run the rule over one file.
    fn check(&self, content: &str, file: &str) -> Vec<Finding>;
}

/// Registry of all rules, in execution order.
///
/// Order only affects how findings of equal severity within one file are
/// displayed.
pub fn all_rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(DefaultInt8),
        Box::new(SmallModelNf4),
        Box::new(SequentialGenerate),
        Box::new(PrecisionConflict),
        Box::new(MissingDeviceMap),
        Box::new(Redundant4BitParams),
    ]
}
