// Copyright 2025 EcoCompute Contributors
// SPDX-License-Identifier: Apache-2.0

//! Finding severity scale.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Severity of an audit finding.
///
/// Variants are declared in ascending order so the derived `Ord` gives
/// `Info < Warning < Critical`, which is what threshold filtering relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Code-quality or placement hint.
    Info,
    /// Measurable energy waste in common configurations.
    Warning,
    /// Large, measured energy penalty or undefined behaviour.
    Critical,
}

impl Severity {
    /// All severities, most severe first.
    pub const ALL: [Severity; 3] = [Severity::Critical, Severity::Warning, Severity::Info];

    /// Lowercase identifier, as accepted by [`FromStr`].
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }

    /// Human-readable label used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Critical => "🔴 Critical",
            Self::Warning => "🟡 Warning",
            Self::Info => "🟠 Info",
        }
    }

    /// Whether a finding of this severity passes the given threshold (inclusive).
    pub fn meets(&self, threshold: Severity) -> bool {
        *self >= threshold
    }
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Warning
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a severity string is not one of `info`, `warning`, `critical`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid severity '{0}': expected one of info, warning, critical")]
pub struct ParseSeverityError(pub String);

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "info" => Ok(Self::Info),
            "warning" | "warn" => Ok(Self::Warning),
            "critical" => Ok(Self::Critical),
            _ => Err(ParseSeverityError(s.to_string())),
        }
    }
}

/// Finding counts per severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    /// Number of critical findings.
    pub critical: usize,
    /// Number of warning findings.
    pub warning: usize,
    /// Number of info findings.
    pub info: usize,
}

impl SeverityCounts {
    /// Count severities from an iterator.
    pub fn tally<I>(severities: I) -> Self
    where
        I: IntoIterator<Item = Severity>,
    {
        severities
            .into_iter()
            .fold(Self::default(), |mut counts, severity| {
                match severity {
                    Severity::Critical => counts.critical += 1,
                    Severity::Warning => counts.warning += 1,
                    Severity::Info => counts.info += 1,
                }
                counts
            })
    }

    /// Total number of findings.
    pub fn total(&self) -> usize {
        self.critical + self.warning + self.info
    }

    /// Count for a single severity.
    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.critical,
            Severity::Warning => self.warning,
            Severity::Info => self.info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_is_ascending_by_severity() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Critical);
        assert!(Severity::Critical.meets(Severity::Warning));
        assert!(Severity::Warning.meets(Severity::Warning));
        assert!(!Severity::Info.meets(Severity::Warning));
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("CRITICAL".parse::<Severity>(), Ok(Severity::Critical));
        assert_eq!(" info ".parse::<Severity>(), Ok(Severity::Info));
        assert_eq!("Warning".parse::<Severity>(), Ok(Severity::Warning));
        assert!("fatal".parse::<Severity>().is_err());
    }

    #[test]
    fn test_default_threshold_is_warning() {
        assert_eq!(Severity::default(), Severity::Warning);
    }

    #[test]
    fn test_serde_uses_lowercase() {
        let json = serde_json::to_string(&Severity::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
        let parsed: Severity = serde_json::from_str("\"info\"").unwrap();
        assert_eq!(parsed, Severity::Info);
    }

    #[test]
    fn test_tally() {
        let counts = SeverityCounts::tally([
            Severity::Critical,
            Severity::Info,
            Severity::Critical,
            Severity::Warning,
        ]);
        assert_eq!(counts.critical, 2);
        assert_eq!(counts.warning, 1);
        assert_eq!(counts.info, 1);
        assert_eq!(counts.total(), 4);
        assert_eq!(counts.get(Severity::Critical), 2);
    }
}
