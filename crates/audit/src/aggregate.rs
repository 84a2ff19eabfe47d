// Copyright 2025 EcoCompute Contributors
// SPDX-License-Identifier: Apache-2.0

//! Finding aggregation: threshold filtering and deterministic ordering.

use ecocompute_core::{Finding, Severity, SeverityCounts};

/// Keep findings at or above `threshold` and order them by severity
/// (most severe first), then file name.
///
/// The sort is stable, so findings with equal keys keep the order the rules
/// produced them in.
pub fn aggregate(findings: Vec<Finding>, threshold: Severity) -> Vec<Finding> {
    let mut kept: Vec<Finding> = findings
        .into_iter()
        .filter(|finding| finding.severity().meets(threshold))
        .collect();

    kept.sort_by(|a, b| {
        b.severity()
            .cmp(&a.severity())
            .then_with(|| a.file().cmp(b.file()))
    });
    kept
}

/// Count findings per severity.
pub fn count(findings: &[Finding]) -> SeverityCounts {
    SeverityCounts::tally(findings.iter().map(Finding::severity))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(rule: &str, severity: Severity, file: &str) -> Finding {
        Finding::builder(rule, severity).at(file, None).build()
    }

    #[test]
    fn test_orders_by_severity_then_file() {
        let findings = vec![
            finding("r1", Severity::Info, "fileB"),
            finding("r2", Severity::Critical, "fileA"),
            finding("r3", Severity::Warning, "fileA"),
            finding("r4", Severity::Critical, "fileZ"),
        ];

        let ordered: Vec<_> = aggregate(findings, Severity::Info)
            .iter()
            .map(|f| (f.severity(), f.file().to_string()))
            .collect();

        assert_eq!(
            ordered,
            vec![
                (Severity::Critical, "fileA".to_string()),
                (Severity::Critical, "fileZ".to_string()),
                (Severity::Warning, "fileA".to_string()),
                (Severity::Info, "fileB".to_string()),
            ]
        );
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let findings = vec![
            finding("r1", Severity::Info, "a"),
            finding("r2", Severity::Warning, "a"),
            finding("r3", Severity::Critical, "a"),
        ];
        assert_eq!(aggregate(findings.clone(), Severity::Warning).len(), 2);
        assert_eq!(aggregate(findings.clone(), Severity::Critical).len(), 1);
        assert_eq!(aggregate(findings, Severity::Info).len(), 3);
    }

    #[test]
    fn test_ties_keep_rule_order() {
        let findings = vec![
            finding("first", Severity::Info, "same.py"),
            finding("second", Severity::Info, "same.py"),
        ];
        let ordered = aggregate(findings, Severity::Info);
        assert_eq!(ordered[0].rule_id(), "first");
        assert_eq!(ordered[1].rule_id(), "second");
    }

    #[test]
    fn test_count() {
        let findings = vec![
            finding("a", Severity::Critical, "x"),
            finding("b", Severity::Warning, "x"),
            finding("c", Severity::Warning, "y"),
        ];
        let counts = count(&findings);
        assert_eq!((counts.critical, counts.warning, counts.info), (1, 2, 0));
    }
}
