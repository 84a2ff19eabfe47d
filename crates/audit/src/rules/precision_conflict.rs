// Copyright 2025 EcoCompute Contributors
// SPDX-License-Identifier: Apache-2.0

//! Both 8-bit and 4-bit loading enabled in one file.

use ecocompute_core::{Finding, Severity};

use super::patterns::{any_code_line_matches, first_match_line, INT8_FLAG, NF4_FLAG};
use super::Rule;

/// Flags files that enable INT8 and NF4 at the same time.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrecisionConflict;

impl Rule for PrecisionConflict {
    fn id(&self) -> &'static str {
        "precision-conflict"
    }

    fn severity(&self) -> Severity {
        Severity::Critical
    }

    fn check(&self, content: &str, file: &str) -> Vec<Finding> {
        let Some(int8_line) = first_match_line(content, &INT8_FLAG) else {
            return Vec::new();
        };
        if !any_code_line_matches(content, &NF4_FLAG) {
            return Vec::new();
        }

        vec![Finding::builder(self.id(), self.severity())
            .title("Mixed precision conflict: both INT8 and NF4 enabled")
            .description(
                "Both `load_in_8bit=True` and `load_in_4bit=True` are present in the same \
                 file. bitsandbytes may silently pick one, leading to unexpected energy \
                 consumption and potential errors.",
            )
            .remediation(
                "Choose one quantization method. For models ≥6B on consumer GPUs, use NF4. \
                 For datacenter GPUs with ample VRAM, use FP16.\n\
                 Remove the conflicting flag.",
            )
            .at(file, Some(int8_line))
            .energy_impact("Unpredictable")
            .build()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_once_regardless_of_order() {
        let int8_first = "a = dict(load_in_8bit=True)\nb = dict(load_in_4bit=True)\n";
        let nf4_first = "b = dict(load_in_4bit=True)\n\n\na = dict(load_in_8bit=True)\n";

        let first = PrecisionConflict.check(int8_first, "a.py");
        let second = PrecisionConflict.check(nf4_first, "b.py");
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(first[0].line(), Some(1));
        assert_eq!(second[0].line(), Some(4));
    }

    #[test]
    fn test_single_flag_is_fine() {
        assert!(PrecisionConflict.check("dict(load_in_8bit=True)", "a.py").is_empty());
        assert!(PrecisionConflict.check("dict(load_in_4bit=True)", "a.py").is_empty());
    }

    #[test]
    fn test_commented_flag_does_not_conflict() {
        let content = "a = dict(load_in_8bit=True)  # load_in_4bit=True\n";
        assert!(PrecisionConflict.check(content, "a.py").is_empty());
    }
}
