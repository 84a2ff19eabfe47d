// Copyright 2025 EcoCompute Contributors
// SPDX-License-Identifier: Apache-2.0

//! Sequential single-request generation (batch size 1 in a loop).
//!
//! This is a lexical scan, not a parse: a `for x in y:` header opens a body
//! that lasts until the first non-blank line indented no deeper than the
//! header. A `.generate(` call anywhere in that body counts.

use ecocompute_core::{Finding, Severity};

use super::patterns::{indentation, GENERATE_CALL, LOOP_HEADER};
use super::Rule;

/// Line (1-based) of the first loop whose body calls `.generate(`.
pub(crate) fn find_generate_loop(content: &str) -> Option<usize> {
    let lines: Vec<&str> = content.lines().collect();

    for (idx, header) in lines.iter().enumerate() {
        if !LOOP_HEADER.is_match(header) {
            continue;
        }
        let header_indent = indentation(header);

        for body in &lines[idx + 1..] {
            if body.trim().is_empty() {
                continue;
            }
            if indentation(body) <= header_indent {
                break;
            }
            if body.contains(GENERATE_CALL) {
                return Some(idx + 1);
            }
        }
    }

    None
}

/// Flags prompts processed one at a time through `model.generate`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialGenerate;

impl Rule for SequentialGenerate {
    fn id(&self) -> &'static str {
        "sequential-generate"
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn check(&self, content: &str, file: &str) -> Vec<Finding> {
        let Some(line) = find_generate_loop(content) else {
            return Vec::new();
        };

        vec![Finding::builder(self.id(), self.severity())
            .title("Sequential single-request processing (BS=1)")
            .description(
                "Processing prompts in a loop wastes up to 95.7% energy vs batched inference. \
                 Measured on A800: BS=1 → 1,768 J/request, BS=64 → 76 J/request. \
                 GPU utilization at BS=1 is only 45%.",
            )
            .remediation(
                "Batch your inputs or use a serving framework:\n\
                 ```python\n\
                 # Option 1: Batch with tokenizer\n\
                 inputs = tokenizer(prompts, padding=True, return_tensors='pt').to('cuda')\n\
                 outputs = model.generate(**inputs)\n\
                 \n\
                 # Option 2: Use vLLM for production\n\
                 from vllm import LLM\n\
                 llm = LLM(model=model_name)\n\
                 outputs = llm.generate(prompts)\n\
                 ```",
            )
            .at(file, Some(line))
            .energy_impact("Up to 95.7% energy waste vs batched")
            .build()]
    }
}
