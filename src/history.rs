//! Feature decision history, keyed by normalized feature name.

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::bench::report::ComparisonReport;
use crate::error::{BenchError, Result};

/// One recorded implement/reject decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureHistoryEntry {
    pub date: String,
    pub feature: String,
    pub test_approach: String,
    pub technical_outcome: String,
    pub impact: String,
    pub implemented: bool,
}

impl FeatureHistoryEntry {
    /// Build the entry for a decision taken on `report`
    pub fn from_decision(report: &ComparisonReport, implemented: bool) -> Self {
        let test_approach = format!(
            "Compared {} vs {} implementation across {} endpoints",
            report.baseline_label.to_lowercase(),
            report.candidate_label.to_lowercase(),
            report.rows.len()
        );

        let (technical_outcome, impact) = if implemented {
            (
                report.summary.impact_summary(),
                "Implemented based on performance results".to_string(),
            )
        } else {
            (
                "Performance testing showed no improvement".to_string(),
                "Not implemented - no performance benefit".to_string(),
            )
        };

        Self {
            date: Local::now().format("%Y-%m-%d").to_string(),
            feature: report.feature.clone(),
            test_approach,
            technical_outcome,
            impact,
            implemented,
        }
    }
}

/// Canonical key: lowercase, words separated by single dashes.
///
/// "Request Batching", "request_batching" and "request-batching" all map to
/// `request-batching`.
pub fn normalize_feature_key(feature: &str) -> String {
    feature
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '_' || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Keyed store of feature decisions with replace-on-write semantics
pub trait FeatureHistoryRecorder {
    /// Replace whatever is stored under the normalized key of `feature`
    fn upsert(&self, feature: &str, entry: FeatureHistoryEntry) -> Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryDocument {
    #[serde(default)]
    feature_history: BTreeMap<String, FeatureHistoryEntry>,
}

/// History stored as a single YAML document
#[derive(Debug, Clone)]
pub struct YamlHistoryStore {
    path: PathBuf,
}

impl YamlHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole store; a missing or empty file is an empty store
    pub fn load(&self) -> Result<BTreeMap<String, FeatureHistoryEntry>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        let document: HistoryDocument =
            serde_yaml::from_str(&content).map_err(|e| BenchError::HistoryStoreCorrupt {
                path: self.path.clone(),
                message: e.to_string(),
            })?;
        Ok(document.feature_history)
    }

    pub fn get(&self, feature: &str) -> Result<Option<FeatureHistoryEntry>> {
        Ok(self.load()?.remove(&normalize_feature_key(feature)))
    }

    /// Write the store to a temporary sibling, then rename it into place
    fn write_atomic(&self, entries: BTreeMap<String, FeatureHistoryEntry>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let document = HistoryDocument {
            feature_history: entries,
        };
        let yaml =
            serde_yaml::to_string(&document).map_err(|e| BenchError::Serialization(e.to_string()))?;

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(yaml.as_bytes())?;
        file.sync_all()?;
        drop(file);

        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        Ok(())
    }
}

impl FeatureHistoryRecorder for YamlHistoryStore {
    fn upsert(&self, feature: &str, entry: FeatureHistoryEntry) -> Result<()> {
        let key = normalize_feature_key(feature);
        if key.is_empty() {
            return Err(BenchError::InvalidConfig(
                "feature name must contain at least one word".to_string(),
            ));
        }

        let mut entries = self.load()?;
        let replaced = entries.insert(key.clone(), entry).is_some();
        self.write_atomic(entries)?;

        tracing::info!(
            feature = %key,
            path = %self.path.display(),
            replaced = replaced,
            "Feature history updated"
        );
        Ok(())
    }
}
