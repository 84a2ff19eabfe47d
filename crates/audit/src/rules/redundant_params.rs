// Copyright 2025 EcoCompute Contributors
// SPDX-License-Identifier: Apache-2.0

//! 4-bit parameters set while 4-bit loading is off.

use regex::Regex;

use ecocompute_core::{Finding, Severity};

use super::patterns::{NF4_COMPUTE_DTYPE, NF4_FLAG, NF4_QUANT_TYPE};
use super::Rule;

/// Flags `bnb_4bit_*` parameters that have no effect.
///
/// The 4-bit flag is looked up in the whole raw file, not a window, so a
/// flag enabled anywhere silences both checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct Redundant4BitParams;

impl Redundant4BitParams {
    fn finding(&self, param: &str, file: &str) -> Finding {
        Finding::builder(self.id(), self.severity())
            .title(format!("Redundant parameter: {param} without load_in_4bit"))
            .description(format!(
                "`{param}` is set but `load_in_4bit` is not enabled. This parameter has no effect."
            ))
            .remediation(format!("Remove `{param}` or enable `load_in_4bit=True`."))
            .at(file, None)
            .energy_impact("None (code quality)")
            .build()
    }
}

impl Rule for Redundant4BitParams {
    fn id(&self) -> &'static str {
        "redundant-4bit-param"
    }

    fn severity(&self) -> Severity {
        Severity::Info
    }

    fn check(&self, content: &str, file: &str) -> Vec<Finding> {
        if NF4_FLAG.is_match(content) {
            return Vec::new();
        }

        let params: [(&Regex, &str); 2] = [
            (&*NF4_COMPUTE_DTYPE, "bnb_4bit_compute_dtype"),
            (&*NF4_QUANT_TYPE, "bnb_4bit_quant_type"),
        ];

        params
            .into_iter()
            .filter(|(pattern, _)| pattern.is_match(content))
            .map(|(_, param)| self.finding(param, file))
            .collect()
    }
}
