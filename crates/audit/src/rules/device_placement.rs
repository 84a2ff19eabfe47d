// Copyright 2025 EcoCompute Contributors
// SPDX-License-Identifier: Apache-2.0

//! `from_pretrained()` without `device_map`.

use ecocompute_core::{Finding, Severity};

use super::patterns::{strip_comment, DEVICE_MAP, FROM_PRETRAINED};
use super::Rule;

/// Lines of context searched on each side of a loading call.
pub const CONTEXT_LINES: usize = 5;

/// Line (1-based) of the first model-loading call with no `device_map`
/// within [`CONTEXT_LINES`] lines on either side. Tokenizer loads are skipped.
pub(crate) fn find_unplaced_load(content: &str) -> Option<usize> {
    let lines: Vec<&str> = content.lines().collect();

    for (idx, line) in lines.iter().enumerate() {
        if !FROM_PRETRAINED.is_match(strip_comment(line)) {
            continue;
        }

        let start = idx.saturating_sub(CONTEXT_LINES);
        let end = (idx + CONTEXT_LINES + 1).min(lines.len());
        let placed = lines[start..end].iter().any(|l| DEVICE_MAP.is_match(l));
        if placed {
            continue;
        }

        if line.to_lowercase().contains("tokenizer") || line.contains("Tokenizer") {
            continue;
        }
        return Some(idx + 1);
    }

    None
}

/// Flags model loads that leave device placement to chance.
#[derive(Debug, Clone, Copy, Default)]
pub struct MissingDeviceMap;

impl Rule for MissingDeviceMap {
    fn id(&self) -> &'static str {
        "missing-device-map"
    }

    fn severity(&self) -> Severity {
        Severity::Info
    }

    fn check(&self, content: &str, file: &str) -> Vec<Finding> {
        let Some(line) = find_unplaced_load(content) else {
            return Vec::new();
        };

        vec![Finding::builder(self.id(), self.severity())
            .title("Missing device_map in from_pretrained()")
            .description(
                "Without `device_map`, the model may load on CPU or a suboptimal device, \
                 causing significant performance degradation.",
            )
            .remediation(
                "Add `device_map=\"auto\"` or `device_map=\"cuda\"`:\n\
                 ```python\n\
                 model = AutoModelForCausalLM.from_pretrained(\n    \
                     model_name,\n    \
                     device_map=\"auto\",\n\
                 )\n\
                 ```",
            )
            .at(file, Some(line))
            .energy_impact("Potential: significant if model runs on CPU")
            .build()]
    }
}
