// Copyright 2025 EcoCompute Contributors
// SPDX-License-Identifier: Apache-2.0

//! Default INT8: `load_in_8bit=True` without `llm_int8_threshold=0.0`.
//!
//! Without the zero threshold, bitsandbytes keeps outlier columns in FP16 and
//! converts between INT8 and FP16 at every linear layer. Measured penalty:
//! +17–147% energy versus FP16.

use ecocompute_core::{Finding, Severity};

use super::patterns::{any_code_line_matches, first_match_line, INT8_FLAG, INT8_ZERO_THRESHOLD};
use super::Rule;

/// Flags 8-bit loading that keeps mixed-precision decomposition enabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultInt8;

impl Rule for DefaultInt8 {
    fn id(&self) -> &'static str {
        "default-int8"
    }

    fn severity(&self) -> Severity {
        Severity::Critical
    }

    fn check(&self, content: &str, file: &str) -> Vec<Finding> {
        let Some(flag_line) = first_match_line(content, &INT8_FLAG) else {
            return Vec::new();
        };
        if any_code_line_matches(content, &INT8_ZERO_THRESHOLD) {
            return Vec::new();
        }

        vec![Finding::builder(self.id(), self.severity())
            .title("Default INT8 (bitsandbytes mixed-precision decomposition)")
            .description(
                "`load_in_8bit=True` without `llm_int8_threshold=0.0` causes 17–147% energy \
                 waste due to INT8↔FP16 type conversion at every linear layer. Measured on \
                 RTX 4090D (+32.7%) and A800 (+122–147%).",
            )
            .remediation(
                "Add `llm_int8_threshold=0.0` to your BitsAndBytesConfig:\n\
                 ```python\n\
                 config = BitsAndBytesConfig(\n    \
                     load_in_8bit=True,\n    \
                     llm_int8_threshold=0.0,  # Disables mixed-precision decomposition\n\
                 )\n\
                 ```",
            )
            .at(file, Some(flag_line))
            .energy_impact("+17–147% energy vs FP16")
            .build()]
    }
}
