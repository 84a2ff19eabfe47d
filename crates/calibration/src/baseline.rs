// Copyright 2025 EcoCompute Contributors
// SPDX-License-Identifier: Apache-2.0

//! Baseline persistence.
//!
//! The store is a single JSON document holding one [`Baseline`] per
//! hardware fingerprint:
//!
//! ```json
//! { "baselines": { "3f2a9c01b7de": { "gpu_name": "...", ... } } }
//! ```
//!
//! Reads never fail the run: a missing or malformed document means "no
//! baseline". Writes merge into the existing document and replace it
//! atomically through a temporary file in the same directory.

use chrono::{SecondsFormat, Utc};
use ecocompute_core::SeverityCounts;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::calibrate::{CalibrationMethod, CalibrationResult};
use crate::error::BaselineError;
use crate::hardware::HardwareProfile;

/// Key used when a baseline has no fingerprint.
pub const DEFAULT_KEY: &str = "default";

/// Summary of one accepted run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Baseline {
    /// Fingerprint of the hardware the run was measured on.
    #[serde(alias = "hardware_hash")]
    pub hardware_fingerprint: String,
    /// GPU display name.
    pub gpu_name: String,
    /// RFC 3339 UTC timestamp.
    pub timestamp: String,
    /// Benchmark throughput in TFLOPS.
    #[serde(alias = "benchmark_score")]
    pub benchmark_score_tflops: f64,
    /// Mean power draw in watts.
    #[serde(alias = "power_draw_w")]
    pub avg_power_draw_w: f64,
    /// Joules per tera-operation.
    #[serde(alias = "energy_per_tflop")]
    pub energy_per_tflop_joules: f64,
    /// Findings after threshold filtering.
    #[serde(alias = "issues_found")]
    pub total_issues: usize,
    /// Critical findings.
    pub critical_count: usize,
    /// Warning findings.
    pub warning_count: usize,
    /// Commit the run was taken on.
    pub commit_sha: String,
    /// Branch the run was taken on.
    pub branch: String,
    /// Calibration method; absent in documents written by older versions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<CalibrationMethod>,
}

impl Baseline {
    /// Build a baseline from the results of the current run, stamped now.
    pub fn from_run(
        hardware: &HardwareProfile,
        calibration: &CalibrationResult,
        counts: &SeverityCounts,
        commit_sha: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            hardware_fingerprint: hardware.hardware_fingerprint.clone(),
            gpu_name: hardware.display_name.clone(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            benchmark_score_tflops: calibration.benchmark_score_tflops,
            avg_power_draw_w: calibration.avg_power_draw_w,
            energy_per_tflop_joules: calibration.energy_per_tflop_joules,
            total_issues: counts.total(),
            critical_count: counts.critical,
            warning_count: counts.warning,
            commit_sha: commit_sha.into(),
            branch: branch.into(),
            method: Some(calibration.method),
        }
    }

    /// Key this baseline is stored under.
    pub fn key(&self) -> &str {
        if self.hardware_fingerprint.is_empty() {
            DEFAULT_KEY
        } else {
            &self.hardware_fingerprint
        }
    }
}

/// On-disk document: fingerprint → baseline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BaselineDocument {
    /// Stored baselines.
    pub baselines: BTreeMap<String, Baseline>,
}

impl BaselineDocument {
    /// Parse a document, accepting the legacy single-record layout.
    pub fn parse(text: &str) -> Result<Self, BaselineError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(root) = value else {
            return Err(BaselineError::NotAnObject);
        };

        if root.contains_key("baselines") {
            return Ok(serde_json::from_value(Value::Object(root))?);
        }

        let legacy: Baseline = serde_json::from_value(Value::Object(root))?;
        debug!("Read legacy single-record baseline document");
        let mut baselines = BTreeMap::new();
        baselines.insert(legacy.key().to_string(), legacy);
        Ok(Self { baselines })
    }

    /// Baseline for `fingerprint`, else the one with the latest timestamp.
    ///
    /// Equal timestamps resolve to the smallest key.
    pub fn select(&self, fingerprint: &str) -> Option<&Baseline> {
        if !fingerprint.is_empty() {
            if let Some(baseline) = self.baselines.get(fingerprint) {
                return Some(baseline);
            }
        }
        self.baselines
            .iter()
            .max_by_key(|(key, baseline)| (baseline.timestamp.as_str(), Reverse(key.as_str())))
            .map(|(_, baseline)| baseline)
    }
}

/// File-backed baseline store.
#[derive(Debug, Clone)]
pub struct BaselineStore {
    path: PathBuf,
}

impl BaselineStore {
    /// Store backed by the document at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Document path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the document; `Ok(None)` if it does not exist.
    pub fn read_document(&self) -> Result<Option<BaselineDocument>, BaselineError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(BaselineError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        BaselineDocument::parse(&text).map(Some)
    }

    /// Baseline for `fingerprint`, falling back to the most recent one.
    ///
    /// The fallback may return a baseline recorded on other hardware, so
    /// callers must compare fingerprints. Read and parse errors are logged
    /// and treated as "no baseline".
    pub fn load(&self, fingerprint: &str) -> Option<Baseline> {
        let document = match self.read_document() {
            Ok(Some(document)) => document,
            Ok(None) => {
                debug!(path = %self.path.display(), "No baseline document");
                return None;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable baseline document");
                return None;
            }
        };

        let baseline = document.select(fingerprint).cloned();
        if let Some(found) = &baseline {
            debug!(
                requested = %fingerprint,
                found = %found.hardware_fingerprint,
                "Loaded baseline"
            );
        }
        baseline
    }

    /// Upsert `baseline` under its fingerprint, keeping all other entries.
    ///
    /// Returns the key the baseline was stored under.
    pub fn save(&self, baseline: &Baseline) -> Result<String, BaselineError> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|source| BaselineError::Io {
            path: dir.clone(),
            source,
        })?;

        let mut document = match self.read_document() {
            Ok(document) => document.unwrap_or_default(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Replacing unreadable baseline document");
                BaselineDocument::default()
            }
        };

        let key = baseline.key().to_string();
        document.baselines.insert(key.clone(), baseline.clone());

        let json = serde_json::to_string_pretty(&document)?;
        let io_err = |source: io::Error| BaselineError::Io {
            path: dir.clone(),
            source,
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err)?;
        tmp.write_all(json.as_bytes()).map_err(io_err)?;
        tmp.write_all(b"\n").map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path)
            .map_err(|e| BaselineError::Persist {
                path: self.path.clone(),
                source: e.error,
            })?;

        info!(key = %key, path = %self.path.display(), "Saved baseline");
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn baseline(fingerprint: &str, timestamp: &str, critical: usize) -> Baseline {
        Baseline {
            hardware_fingerprint: fingerprint.to_string(),
            gpu_name: "RTX 4090".to_string(),
            timestamp: timestamp.to_string(),
            benchmark_score_tflops: 80.0,
            avg_power_draw_w: 400.0,
            energy_per_tflop_joules: 5.0,
            total_issues: critical + 1,
            critical_count: critical,
            warning_count: 1,
            commit_sha: "abc123".to_string(),
            branch: "main".to_string(),
            method: Some(CalibrationMethod::ComputeBenchmark),
        }
    }

    fn store(dir: &TempDir) -> BaselineStore {
        BaselineStore::new(dir.path().join(".ecocompute").join("baseline.json"))
    }

    #[test]
    fn test_missing_document_is_no_baseline() {
        let dir = TempDir::new().unwrap();
        assert!(store(&dir).load("abc").is_none());
    }

    #[test]
    fn test_round_trip_preserves_other_keys() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let other = baseline("other0000000", "2025-01-01T00:00:00Z", 0);
        let mine = baseline("mine00000000", "2024-01-01T00:00:00Z", 2);

        store.save(&other).unwrap();
        assert_eq!(store.save(&mine).unwrap(), "mine00000000");

        assert_eq!(store.load("mine00000000"), Some(mine));
        assert_eq!(store.load("other0000000"), Some(other));
        let document = store.read_document().unwrap().unwrap();
        assert_eq!(document.baselines.len(), 2);
    }

    #[test]
    fn test_save_overwrites_same_key() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.save(&baseline("fp", "2025-01-01T00:00:00Z", 3)).unwrap();
        store.save(&baseline("fp", "2025-02-01T00:00:00Z", 0)).unwrap();

        let loaded = store.load("fp").unwrap();
        assert_eq!(loaded.critical_count, 0);
        assert_eq!(store.read_document().unwrap().unwrap().baselines.len(), 1);
    }

    #[test]
    fn test_unknown_fingerprint_falls_back_to_latest() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.save(&baseline("old", "2024-06-01T00:00:00Z", 0)).unwrap();
        store.save(&baseline("new", "2025-06-01T00:00:00Z", 0)).unwrap();

        assert_eq!(store.load("missing").unwrap().hardware_fingerprint, "new");
        assert_eq!(store.load("").unwrap().hardware_fingerprint, "new");
    }

    #[test]
    fn test_equal_timestamps_fall_back_to_smallest_key() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.save(&baseline("bbbb", "2025-06-01T00:00:00Z", 0)).unwrap();
        store.save(&baseline("cccc", "2025-06-01T00:00:00Z", 0)).unwrap();
        store.save(&baseline("aaaa", "2025-06-01T00:00:00Z", 0)).unwrap();
        store.save(&baseline("zzzz", "2024-06-01T00:00:00Z", 0)).unwrap();

        assert_eq!(store.load("missing").unwrap().hardware_fingerprint, "aaaa");
    }

    #[test]
    fn test_empty_fingerprint_saves_under_default() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert_eq!(store.save(&baseline("", "2025-01-01T00:00:00Z", 0)).unwrap(), DEFAULT_KEY);
        let document = store.read_document().unwrap().unwrap();
        assert!(document.baselines.contains_key(DEFAULT_KEY));
    }

    #[test]
    fn test_corrupt_document_is_no_baseline_and_is_replaced_on_save() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "{ not json").unwrap();

        assert!(store.load("fp").is_none());

        store.save(&baseline("fp", "2025-01-01T00:00:00Z", 0)).unwrap();
        assert!(store.load("fp").is_some());
    }

    #[test]
    fn test_non_object_root_is_no_baseline() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "[1, 2, 3]").unwrap();
        assert!(store.load("fp").is_none());
    }

    #[test]
    fn test_legacy_document_is_read_and_migrated() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(
            store.path(),
            r#"{"hardware_hash": "legacy000000", "gpu_name": "A800", "issues_found": 4,
                "critical_count": 1, "timestamp": "2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        let legacy = store.load("anything").unwrap();
        assert_eq!(legacy.hardware_fingerprint, "legacy000000");
        assert_eq!(legacy.total_issues, 4);
        assert_eq!(legacy.method, None);

        store.save(&baseline("fresh", "2025-01-01T00:00:00Z", 0)).unwrap();
        let document = store.read_document().unwrap().unwrap();
        assert!(document.baselines.contains_key("legacy000000"));
        assert!(document.baselines.contains_key("fresh"));
    }

    #[test]
    fn test_partial_record_uses_defaults() {
        let document =
            BaselineDocument::parse(r#"{"baselines": {"fp": {"critical_count": 2}}}"#).unwrap();
        let record = &document.baselines["fp"];
        assert_eq!(record.critical_count, 2);
        assert_eq!(record.energy_per_tflop_joules, 0.0);
        assert!(record.gpu_name.is_empty());
    }

    #[test]
    fn test_from_run_stamps_method_and_counts() {
        let hardware = HardwareProfile::no_gpu();
        let calibration = CalibrationResult::empty(CalibrationMethod::Estimated);
        let counts = SeverityCounts {
            critical: 1,
            warning: 2,
            info: 3,
        };
        let record = Baseline::from_run(&hardware, &calibration, &counts, "deadbeef", "main");
        assert_eq!(record.total_issues, 6);
        assert_eq!(record.critical_count, 1);
        assert_eq!(record.warning_count, 2);
        assert_eq!(record.method, Some(CalibrationMethod::Estimated));
        assert_eq!(record.key(), hardware.hardware_fingerprint);
        assert_ne!(record.key(), DEFAULT_KEY);
        assert!(chrono::DateTime::parse_from_rfc3339(&record.timestamp).is_ok());
    }
}
