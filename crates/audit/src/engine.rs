// Copyright 2025 EcoCompute Contributors
// SPDX-License-Identifier: Apache-2.0

//! Audit engine: runs every rule over every file and aggregates the result.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use ecocompute_core::{Finding, Severity, SeverityCounts};

use crate::aggregate::{aggregate, count};
use crate::error::{AuditError, Result};
use crate::rules::{all_rules, Rule};

/// Keywords of the quantization / generation APIs the rules look at.
///
/// Files containing none of them (compared case-insensitively) cannot
/// produce a finding and are skipped without running the rules.
pub const PRESCAN_KEYWORDS: [&str; 8] = [
    "BitsAndBytesConfig",
    "load_in_8bit",
    "load_in_4bit",
    "quantization_config",
    "from_pretrained",
    ".generate(",
    "bnb_4bit",
    "llm_int8",
];

/// Whether `content` mentions any prescan keyword.
pub fn needs_scan(content: &str) -> bool {
    let lowered = content.to_lowercase();
    PRESCAN_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(&keyword.to_lowercase()))
}

/// Result of auditing a set of files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    /// Filtered, ordered findings.
    pub findings: Vec<Finding>,
    /// Files handed to the engine, including skipped ones.
    pub files_scanned: usize,
    /// Files skipped by the keyword prescan.
    pub files_skipped: usize,
    /// Files that could not be read.
    pub files_failed: usize,
    /// Threshold the findings were filtered with.
    pub threshold: Severity,
    /// Counts of the filtered findings.
    pub counts: SeverityCounts,
}

impl AuditReport {
    /// Whether any critical finding survived filtering.
    pub fn has_critical(&self) -> bool {
        self.counts.critical > 0
    }

    /// Total number of reported findings.
    pub fn total(&self) -> usize {
        self.findings.len()
    }
}

/// Ordered rule set applied to source files.
pub struct AuditEngine {
    rules: Vec<Box<dyn Rule>>,
}

impl Default for AuditEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditEngine {
    /// Engine with every registered rule.
    pub fn new() -> Self {
        Self { rules: all_rules() }
    }

    /// Engine with a custom rule set.
    pub fn with_rules(rules: Vec<Box<dyn Rule>>) -> Self {
        Self { rules }
    }

    /// Rules in execution order.
    pub fn rules(&self) -> &[Box<dyn Rule>] {
        &self.rules
    }

    /// Run every rule over `content`, without prescan or filtering.
    pub fn scan_source(&self, content: &str, file: &str) -> Vec<Finding> {
        self.rules
            .iter()
            .flat_map(|rule| {
                let findings = rule.check(content, file);
                if !findings.is_empty() {
                    debug!(rule = rule.id(), file, count = findings.len(), "Rule fired");
                }
                findings
            })
            .collect()
    }

    /// Audit files on disk, filter by `threshold` and order the findings.
    pub fn run<P: AsRef<Path>>(&self, files: &[P], threshold: Severity) -> AuditReport {
        let mut all_findings = Vec::new();
        let mut files_skipped = 0;
        let mut files_failed = 0;

        for path in files {
            let path = path.as_ref();
            let content = match read_source(path) {
                Ok(content) => content,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable file");
                    files_failed += 1;
                    continue;
                }
            };

            if !needs_scan(&content) {
                debug!(file = %path.display(), "Skipped (no quantization keywords)");
                files_skipped += 1;
                continue;
            }

            debug!(file = %path.display(), "Scanning");
            all_findings.extend(self.scan_source(&content, &path.display().to_string()));
        }

        let findings = aggregate(all_findings, threshold);
        let counts = count(&findings);

        info!(
            files = files.len(),
            skipped = files_skipped,
            failed = files_failed,
            critical = counts.critical,
            warning = counts.warning,
            info = counts.info,
            "Audit complete"
        );

        AuditReport {
            findings,
            files_scanned: files.len(),
            files_skipped,
            files_failed,
            threshold,
            counts,
        }
    }
}

/// Audit `files` with every registered rule.
pub fn run_audit<P: AsRef<Path>>(files: &[P], threshold: Severity) -> AuditReport {
    AuditEngine::new().run(files, threshold)
}

/// Read a source file, replacing invalid UTF-8 rather than failing.
pub fn read_source(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|source| AuditError::Read {
        path: PathBuf::from(path),
        source,
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const SAMPLE: &str = "from transformers import AutoModelForCausalLM, BitsAndBytesConfig\n\
        \n\
        bnb_config = BitsAndBytesConfig(\n    \
            load_in_8bit=True,\n\
        )\n\
        \n\
        model = AutoModelForCausalLM.from_pretrained(\n    \
            \"mistralai/Mistral-7B-Instruct-v0.3\",\n    \
            quantization_config=bnb_config,\n\
        )\n\
        \n\
        prompts = [\"Hello\", \"World\", \"Test\"]\n\
        for p in prompts:\n    \
            output = model.generate(p)\n";

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_end_to_end_warning_threshold() {
        let dir = TempDir::new().unwrap();
        let file = write(&dir, "sample.py", SAMPLE);

        let report = run_audit(&[file], Severity::Warning);

        assert_eq!(report.total(), 2);
        assert_eq!(report.findings[0].severity(), Severity::Critical);
        assert_eq!(report.findings[0].rule_id(), "default-int8");
        assert_eq!(report.findings[1].severity(), Severity::Warning);
        assert_eq!(report.findings[1].rule_id(), "sequential-generate");
        assert_eq!(report.counts.critical, 1);
        assert_eq!(report.counts.warning, 1);
        assert_eq!(report.counts.info, 0);
        assert!(report.has_critical());
    }

    #[test]
    fn test_info_threshold_includes_device_map_hint() {
        let dir = TempDir::new().unwrap();
        let file = write(&dir, "sample.py", SAMPLE);

        let report = run_audit(&[file], Severity::Info);
        assert_eq!(report.counts.info, 1);
        assert_eq!(report.findings.last().unwrap().rule_id(), "missing-device-map");
    }

    #[test]
    fn test_prescan_skips_unrelated_files() {
        let dir = TempDir::new().unwrap();
        let plain = write(&dir, "plain.py", "def add(a, b):\n    return a + b\n");

        let report = run_audit(&[plain], Severity::Info);
        assert_eq!(report.files_scanned, 1);
        assert_eq!(report.files_skipped, 1);
        assert!(report.findings.is_empty());
    }

    #[test]
    fn test_prescan_never_hides_findings() {
        let engine = AuditEngine::new();
        let samples = [
            SAMPLE,
            "LOAD_IN_8BIT=True\n",
            "m = X.FROM_PRETRAINED(\"a\")\n",
            "def add(a, b):\n    return a + b\n",
            "for x in xs:\n    print(x)\n",
        ];
        for sample in samples {
            if !needs_scan(sample) {
                assert!(engine.scan_source(sample, "s.py").is_empty(), "{sample}");
            }
        }
    }

    #[test]
    fn test_unreadable_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        let good = write(&dir, "good.py", SAMPLE);
        let missing = dir.path().join("missing.py");

        let report = run_audit(&[missing, good], Severity::Warning);
        assert_eq!(report.files_failed, 1);
        assert_eq!(report.total(), 2);
    }

    #[test]
    fn test_findings_sorted_across_files() {
        let dir = TempDir::new().unwrap();
        let b = write(&dir, "b.py", "cfg = dict(load_in_8bit=True)\n");
        let a = write(&dir, "a.py", "for p in ps:\n    model.generate(p)\n");

        let report = run_audit(&[b, a], Severity::Info);
        assert_eq!(report.findings[0].severity(), Severity::Critical);
        assert!(report.findings[0].file().ends_with("b.py"));
        assert_eq!(report.findings[1].severity(), Severity::Warning);
    }
}
