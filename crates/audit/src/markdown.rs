// Copyright 2025 EcoCompute Contributors
// SPDX-License-Identifier: Apache-2.0

//! Markdown and JSON rendering of audit reports.

use std::fmt::{self, Write};

use ecocompute_core::{Finding, Severity};

use crate::engine::AuditReport;
use crate::error::Result;

/// Marker placed at the top of rendered reports so a previous report can be
/// found and replaced.
pub const REPORT_MARKER: &str = "<!-- ecocompute-energy-audit -->";

fn section_heading(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "### 🔴 Critical Issues",
        Severity::Warning => "### 🟡 Warnings",
        Severity::Info => "### 🟠 Info",
    }
}

fn write_finding(output: &mut String, finding: &Finding) -> fmt::Result {
    let mut location = format!("`{}`", finding.file());
    if let Some(line) = finding.line() {
        write!(location, " (line {line})")?;
    }

    writeln!(output, "**{}** — {}", finding.title(), location)?;
    writeln!(output, "> {}", finding.description())?;
    writeln!(output)?;

    // Info findings are hints; keep them short.
    if finding.severity() != Severity::Info {
        writeln!(output, "**Energy impact:** {}", finding.energy_impact())?;
        writeln!(output)?;
        writeln!(output, "**Fix:** {}", finding.remediation())?;
        writeln!(output)?;
    }
    Ok(())
}

fn write_summary(output: &mut String, report: &AuditReport) -> fmt::Result {
    writeln!(output, "## ⚡ EcoCompute Energy Audit")?;
    writeln!(output)?;

    if report.findings.is_empty() {
        writeln!(
            output,
            "Scanned **{}** file(s). **No energy waste patterns detected.** ✅",
            report.files_scanned
        )?;
        writeln!(output)?;
        writeln!(output, "> Your quantization configuration looks good!")?;
        return Ok(());
    }

    let parts: Vec<String> = Severity::ALL
        .iter()
        .filter(|severity| report.counts.get(**severity) > 0)
        .map(|severity| {
            let n = report.counts.get(*severity);
            match severity {
                Severity::Critical => format!("**{n}** critical"),
                Severity::Warning => format!("**{n}** warning(s)"),
                Severity::Info => format!("**{n}** info"),
            }
        })
        .collect();

    writeln!(
        output,
        "Scanned **{}** file(s). Found {}.",
        report.files_scanned,
        parts.join(", ")
    )?;
    writeln!(output)?;

    for severity in Severity::ALL {
        let mut group = report
            .findings
            .iter()
            .filter(|finding| finding.severity() == severity)
            .peekable();
        if group.peek().is_none() {
            continue;
        }
        writeln!(output, "{}", section_heading(severity))?;
        writeln!(output)?;
        for finding in group {
            write_finding(output, finding)?;
        }
    }

    writeln!(output, "---")?;
    writeln!(output)?;
    writeln!(
        output,
        "📊 Based on **93+ measurements** across RTX 4090D / A800 / RTX 5090."
    )?;
    Ok(())
}

/// Generate the Markdown audit report.
pub fn generate_report(report: &AuditReport) -> String {
    let mut output = String::new();
    // fmt::Write for String cannot fail
    let _ = write_summary(&mut output, report);
    output
}

/// Generate the Markdown audit report prefixed with [`REPORT_MARKER`].
pub fn generate_marked_report(report: &AuditReport) -> String {
    format!("{REPORT_MARKER}\n{}", generate_report(report))
}

/// Serialize the report as pretty JSON.
pub fn to_json(report: &AuditReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecocompute_core::SeverityCounts;

    fn report(findings: Vec<Finding>) -> AuditReport {
        let counts = SeverityCounts::tally(findings.iter().map(Finding::severity));
        AuditReport {
            findings,
            files_scanned: 3,
            files_skipped: 1,
            files_failed: 0,
            threshold: Severity::Info,
            counts,
        }
    }

    #[test]
    fn test_clean_report() {
        let md = generate_report(&report(Vec::new()));
        assert!(md.contains("Scanned **3** file(s)"));
        assert!(md.contains("No energy waste patterns detected"));
    }

    #[test]
    fn test_sections_and_locations() {
        let findings = vec![
            Finding::builder("default-int8", Severity::Critical)
                .title("Default INT8")
                .description("slow")
                .remediation("set threshold")
                .energy_impact("+17–147%")
                .at("model.py", Some(4))
                .build(),
            Finding::builder("redundant-4bit-param", Severity::Info)
                .title("Redundant")
                .description("no effect")
                .remediation("remove it")
                .at("cfg.py", None)
                .build(),
        ];
        let md = generate_report(&report(findings));

        assert!(md.contains("Found **1** critical, **1** info."));
        assert!(md.contains("### 🔴 Critical Issues"));
        assert!(md.contains("**Default INT8** — `model.py` (line 4)"));
        assert!(md.contains("**Fix:** set threshold"));
        assert!(md.contains("### 🟠 Info"));
        assert!(md.contains("**Redundant** — `cfg.py`\n"));
        assert!(!md.contains("remove it"));
        assert!(!md.contains("### 🟡 Warnings"));
    }

    #[test]
    fn test_marked_report_and_json() {
        let r = report(Vec::new());
        assert!(generate_marked_report(&r).starts_with(REPORT_MARKER));
        let json: serde_json::Value = serde_json::from_str(&to_json(&r).unwrap()).unwrap();
        assert_eq!(json["files_scanned"], 3);
        assert_eq!(json["threshold"], "info");
    }
}
