// Copyright 2025 EcoCompute Contributors
// SPDX-License-Identifier: Apache-2.0

//! Audit finding types.
//!
//! A [`Finding`] is the unit of output of every audit rule. Findings are
//! immutable once built: fields are private and only exposed through
//! accessors, so aggregation can reorder and filter them but never edit them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::severity::Severity;

/// Where a finding was detected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// File identifier as given to the rule (usually a relative path).
    pub file: String,
    /// 1-based line number, if the rule pins the finding to a line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl SourceLocation {
    /// Create a location.
    pub fn new(file: impl Into<String>, line: Option<usize>) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}", self.file, line),
            None => f.write_str(&self.file),
        }
    }
}

/// A single energy-waste finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    rule_id: String,
    severity: Severity,
    title: String,
    description: String,
    remediation: String,
    location: SourceLocation,
    energy_impact: String,
}

impl Finding {
    /// Start building a finding for the given rule.
    pub fn builder(rule_id: impl Into<String>, severity: Severity) -> FindingBuilder {
        FindingBuilder {
            rule_id: rule_id.into(),
            severity,
            title: String::new(),
            description: String::new(),
            remediation: String::new(),
            location: SourceLocation::new("", None),
            energy_impact: String::new(),
        }
    }

    /// Identifier of the rule that produced this finding.
    pub fn rule_id(&self) -> &str {
        &self.rule_id
    }

    /// Severity.
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Short title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Explanation of the waste pattern.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Suggested fix (may contain a fenced code block).
    pub fn remediation(&self) -> &str {
        &self.remediation
    }

    /// Location of the finding.
    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    /// File the finding belongs to.
    pub fn file(&self) -> &str {
        &self.location.file
    }

    /// Line the finding is pinned to, if any.
    pub fn line(&self) -> Option<usize> {
        self.location.line
    }

    /// Human-readable energy impact (not machine-parseable).
    pub fn energy_impact(&self) -> &str {
        &self.energy_impact
    }
}

/// Builder for [`Finding`] instances.
#[derive(Debug, Clone)]
pub struct FindingBuilder {
    rule_id: String,
    severity: Severity,
    title: String,
    description: String,
    remediation: String,
    location: SourceLocation,
    energy_impact: String,
}

impl FindingBuilder {
    /// Set the title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the remediation text.
    pub fn remediation(mut self, remediation: impl Into<String>) -> Self {
        self.remediation = remediation.into();
        self
    }

    /// Set the source location.
    pub fn at(mut self, file: impl Into<String>, line: Option<usize>) -> Self {
        self.location = SourceLocation::new(file, line);
        self
    }

    /// Set the energy impact text.
    pub fn energy_impact(mut self, impact: impl Into<String>) -> Self {
        self.energy_impact = impact.into();
        self
    }

    /// Build the [`Finding`].
    pub fn build(self) -> Finding {
        Finding {
            rule_id: self.rule_id,
            severity: self.severity,
            title: self.title,
            description: self.description,
            remediation: self.remediation,
            location: self.location,
            energy_impact: self.energy_impact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_all_fields() {
        let finding = Finding::builder("default-int8", Severity::Critical)
            .title("Default INT8")
            .description("desc")
            .remediation("fix")
            .at("model.py", Some(4))
            .energy_impact("+17–147%")
            .build();

        assert_eq!(finding.rule_id(), "default-int8");
        assert_eq!(finding.severity(), Severity::Critical);
        assert_eq!(finding.title(), "Default INT8");
        assert_eq!(finding.file(), "model.py");
        assert_eq!(finding.line(), Some(4));
        assert_eq!(finding.location().to_string(), "model.py:4");
    }

    #[test]
    fn test_location_without_line() {
        let location = SourceLocation::new("cfg.py", None);
        assert_eq!(location.to_string(), "cfg.py");
    }

    #[test]
    fn test_serialization_omits_missing_line() {
        let finding = Finding::builder("redundant-4bit-param", Severity::Info)
            .at("cfg.py", None)
            .build();
        let json = serde_json::to_value(&finding).unwrap();
        assert_eq!(json["severity"], "info");
        assert!(json["location"].get("line").is_none());
    }
}
