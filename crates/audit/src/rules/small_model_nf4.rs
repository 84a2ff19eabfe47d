// Copyright 2025 EcoCompute Contributors
// SPDX-License-Identifier: Apache-2.0

//! NF4 on small models (≤ ~3.8B parameters).
//!
//! De-quantization overhead outweighs the memory savings when the model
//! already fits in VRAM: Qwen2-1.5B +29.4%, Phi-3-mini +11.7% on RTX 5090.

use once_cell::sync::Lazy;
use regex::Regex;

use ecocompute_core::{Finding, Severity};

use super::patterns::{first_match_line, NF4_FLAG};
use super::Rule;

/// Small-model name patterns, in reporting priority order.
pub static SMALL_MODELS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"qwen2?-1\.5b", "Qwen2-1.5B"),
        (r"phi-?3-?mini", "Phi-3-mini (3.8B)"),
        (r"phi-?2", "Phi-2 (2.7B)"),
        (r"gemma-?2b", "Gemma-2B"),
        (r"tinyllama", "TinyLlama (1.1B)"),
        (r"stablelm-?2?-?1\.6", "StableLM-1.6B"),
        (r"opt-?1\.3b", "OPT-1.3B"),
        (r"opt-?2\.7b", "OPT-2.7B"),
        (r"gpt-?2", "GPT-2"),
        (r"bloom-?1b", "BLOOM-1B"),
    ]
    .into_iter()
    .map(|(pattern, name)| {
        let regex = Regex::new(&format!("(?i){pattern}")).expect("static model pattern must compile");
        (regex, name)
    })
    .collect()
});

/// First small model referenced anywhere in `content`.
pub fn detect_small_model(content: &str) -> Option<&'static str> {
    SMALL_MODELS
        .iter()
        .find(|(regex, _)| regex.is_match(content))
        .map(|(_, name)| *name)
}

/// Flags 4-bit quantization applied to a small model.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmallModelNf4;

impl Rule for SmallModelNf4 {
    fn id(&self) -> &'static str {
        "small-model-nf4"
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn check(&self, content: &str, file: &str) -> Vec<Finding> {
        let Some(flag_line) = first_match_line(content, &NF4_FLAG) else {
            return Vec::new();
        };
        let Some(model) = detect_small_model(content) else {
            return Vec::new();
        };

        vec![Finding::builder(self.id(), self.severity())
            .title(format!("NF4 quantization on small model ({model})"))
            .description(
                "NF4 (4-bit) quantization on models ≤3B wastes 11–29% energy vs FP16. \
                 De-quantization compute overhead dominates memory savings when the model \
                 fits comfortably in VRAM. Measured: Qwen2-1.5B +29.4%, Phi-3-mini +11.7% \
                 on RTX 5090.",
            )
            .remediation(format!(
                "Use FP16 instead for {model}:\n\
                 ```python\n\
                 model = AutoModelForCausalLM.from_pretrained(\n    \
                     model_name,\n    \
                     torch_dtype=torch.float16,\n    \
                     device_map=\"auto\",\n\
                 )\n\
                 ```"
            ))
            .at(file, Some(flag_line))
            .energy_impact("+11–29% energy vs FP16")
            .build()]
    }
}
