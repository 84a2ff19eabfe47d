// Copyright 2025 EcoCompute Contributors
// SPDX-License-Identifier: Apache-2.0

//! Token patterns and line helpers shared by the rules.

use once_cell::sync::Lazy;
use regex::Regex;

/// Line comment marker. Text from the first marker to end of line is ignored
/// by the token-detection rules.
pub(crate) const COMMENT_MARKER: char = '#';

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static audit pattern must compile")
}

/// `load_in_8bit = True`
pub(crate) static INT8_FLAG: Lazy<Regex> = Lazy::new(|| compile(r"(?i)load_in_8bit\s*=\s*true\b"));

/// `load_in_4bit = True`
pub(crate) static NF4_FLAG: Lazy<Regex> = Lazy::new(|| compile(r"(?i)load_in_4bit\s*=\s*true\b"));

/// `llm_int8_threshold = 0` / `0.0`; `0.5` must not match.
pub(crate) static INT8_ZERO_THRESHOLD: Lazy<Regex> =
    Lazy::new(|| compile(r"(?i)llm_int8_threshold\s*=\s*0(?:\.0*)?(?:[^\d.]|$)"));

/// A model-loading call.
pub(crate) static FROM_PRETRAINED: Lazy<Regex> =
    Lazy::new(|| compile(r"(?i)from_pretrained\s*\("));

/// Explicit device placement keyword.
pub(crate) static DEVICE_MAP: Lazy<Regex> = Lazy::new(|| compile(r"(?i)device_map\s*="));

/// Header of a `for <name> in <iterable>:` loop.
pub(crate) static LOOP_HEADER: Lazy<Regex> =
    Lazy::new(|| compile(r"for\s+\w+\s+in\s+\w+.*:\s*$"));

/// 4-bit compute dtype parameter.
pub(crate) static NF4_COMPUTE_DTYPE: Lazy<Regex> =
    Lazy::new(|| compile(r"(?i)bnb_4bit_compute_dtype"));

/// 4-bit quant type parameter.
pub(crate) static NF4_QUANT_TYPE: Lazy<Regex> = Lazy::new(|| compile(r"(?i)bnb_4bit_quant_type"));

/// Generation call inside a loop body.
pub(crate) const GENERATE_CALL: &str = ".generate(";

/// Drop everything from the first comment marker on.
pub(crate) fn strip_comment(line: &str) -> &str {
    match line.find(COMMENT_MARKER) {
        Some(idx) => &line[..idx],
        None => line,
    }
}

/// Lines with comments stripped, paired with their 1-based line number.
pub(crate) fn code_lines(content: &str) -> impl Iterator<Item = (usize, &str)> {
    content
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, strip_comment(line)))
}

/// First 1-based line whose code portion matches `pattern`.
pub(crate) fn first_match_line(content: &str, pattern: &Regex) -> Option<usize> {
    code_lines(content)
        .find(|(_, code)| pattern.is_match(code))
        .map(|(line_no, _)| line_no)
}

/// Whether any code portion of any line matches `pattern`.
pub(crate) fn any_code_line_matches(content: &str, pattern: &Regex) -> bool {
    code_lines(content).any(|(_, code)| pattern.is_match(code))
}

/// Width of the leading whitespace.
pub(crate) fn indentation(line: &str) -> usize {
    line.len() - line.trim_start().len()
}
